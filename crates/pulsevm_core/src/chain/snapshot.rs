use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::chain::resource::{
    ResourceLimitsConfig, ResourceLimitsObject, ResourceLimitsState, ResourceUsage,
};

/// A record type persisted as its own snapshot section.
pub trait SnapshotRow: Serialize + DeserializeOwned {
    const SECTION: &'static str;
}

impl SnapshotRow for ResourceLimitsObject {
    const SECTION: &'static str = "resource_limits_object";
}

impl SnapshotRow for ResourceUsage {
    const SECTION: &'static str = "resource_usage_object";
}

impl SnapshotRow for ResourceLimitsState {
    const SECTION: &'static str = "resource_limits_state_object";
}

impl SnapshotRow for ResourceLimitsConfig {
    const SECTION: &'static str = "resource_limits_config_object";
}

pub trait SnapshotWriter {
    fn write_section(&mut self, name: &str, rows: Vec<Value>) -> Result<(), ChainError>;
}

pub trait SnapshotReader {
    fn read_section(&self, name: &str) -> Result<Vec<Value>, ChainError>;
}

pub fn write_rows<'a, T, I>(writer: &mut dyn SnapshotWriter, rows: I) -> Result<(), ChainError>
where
    T: SnapshotRow + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let rows = rows
        .into_iter()
        .map(|row| {
            serde_json::to_value(row).map_err(|e| {
                ChainError::SnapshotError(format!("failed to encode {}: {}", T::SECTION, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    writer.write_section(T::SECTION, rows)
}

pub fn read_rows<T: SnapshotRow>(reader: &dyn SnapshotReader) -> Result<Vec<T>, ChainError> {
    reader
        .read_section(T::SECTION)?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                ChainError::SnapshotError(format!("failed to decode {}: {}", T::SECTION, e))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSection {
    pub name: String,
    pub rows: Vec<Value>,
}

/// In-memory snapshot with one ordered section per record type, stored as
/// JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSnapshot {
    pub sections: Vec<SnapshotSection>,
}

impl JsonSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&SnapshotSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        serde_json::to_vec(self)
            .map_err(|e| ChainError::SnapshotError(format!("failed to encode snapshot: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ChainError::SnapshotError(format!("failed to decode snapshot: {}", e)))
    }
}

impl SnapshotWriter for JsonSnapshot {
    fn write_section(&mut self, name: &str, rows: Vec<Value>) -> Result<(), ChainError> {
        if self.section(name).is_some() {
            return Err(ChainError::SnapshotError(format!(
                "section {} already written",
                name
            )));
        }
        self.sections.push(SnapshotSection {
            name: name.to_owned(),
            rows,
        });
        Ok(())
    }
}

impl SnapshotReader for JsonSnapshot {
    fn read_section(&self, name: &str) -> Result<Vec<Value>, ChainError> {
        self.section(name)
            .map(|section| section.rows.clone())
            .ok_or_else(|| ChainError::SnapshotError(format!("missing section {}", name)))
    }
}
