use std::collections::VecDeque;

use pulsevm_error::ChainError;
use pulsevm_name::Name;

use crate::chain::resource::{
    ResourceLimitsConfig, ResourceLimitsObject, ResourceLimitsState, ResourceUsage,
};

/// Before-image of a record touched inside an undo session. `None` means the
/// record did not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectChange {
    Config(Option<ResourceLimitsConfig>),
    State(Option<ResourceLimitsState>),
    Limits(Name, Option<ResourceLimitsObject>),
    Usage(Name, Option<ResourceUsage>),
    PendingLimits(Name, bool),
}

/// Nested stack of change logs. Changes made while no session is open are
/// not recorded and cannot be undone.
#[derive(Debug, Default)]
pub struct UndoStack {
    sessions: Vec<VecDeque<ObjectChange>>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_active(&self) -> bool {
        !self.sessions.is_empty()
    }

    pub fn start_session(&mut self) -> usize {
        self.sessions.push(VecDeque::new());
        self.sessions.len()
    }

    pub fn record(&mut self, change: ObjectChange) {
        if let Some(changes) = self.sessions.last_mut() {
            changes.push_back(change);
        }
    }

    /// Pops the innermost session, returning its changes newest first so the
    /// caller can restore them in order.
    pub fn pop(&mut self) -> Result<Vec<ObjectChange>, ChainError> {
        let changes = self
            .sessions
            .pop()
            .ok_or_else(|| ChainError::DatabaseError("no undo session to undo".to_string()))?;
        Ok(changes.into_iter().rev().collect())
    }

    /// Folds the innermost session into its parent. With no parent the
    /// changes become permanent.
    pub fn squash(&mut self) -> Result<(), ChainError> {
        let changes = self
            .sessions
            .pop()
            .ok_or_else(|| ChainError::DatabaseError("no undo session to squash".to_string()))?;
        if let Some(parent) = self.sessions.last_mut() {
            parent.extend(changes);
        }
        Ok(())
    }

    /// Drops every open session, making all recorded changes permanent.
    pub fn commit(&mut self) {
        self.sessions.clear();
    }
}
