use pulsevm_error::ChainError;
use pulsevm_name::Name;
use serde::Serialize;

use crate::chain::resource::{
    ResourceLimits, ResourceLimitsConfig, ResourceLimitsState, ResourceUsage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepMindOperation {
    Insert,
    Update,
}

impl DeepMindOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeepMindOperation::Insert => "INS",
            DeepMindOperation::Update => "UPD",
        }
    }
}

/// Flat account limits as exported to indexers, `-1` meaning unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountLimitsRow {
    pub owner: Name,
    pub net_weight: i64,
    pub cpu_weight: i64,
    pub ram_bytes: i64,
}

impl AccountLimitsRow {
    pub fn new(owner: Name, limits: &ResourceLimits) -> Self {
        AccountLimitsRow {
            owner,
            net_weight: limits.net_weight.to_i64(),
            cpu_weight: limits.cpu_weight.to_i64(),
            ram_bytes: limits.ram_bytes.to_i64(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlimitRecord<'a> {
    Config(&'a ResourceLimitsConfig),
    State(&'a ResourceLimitsState),
    AccountLimits(AccountLimitsRow),
    AccountUsage(&'a ResourceUsage),
}

impl RlimitRecord<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            RlimitRecord::Config(_) => "CONFIG",
            RlimitRecord::State(_) => "STATE",
            RlimitRecord::AccountLimits(_) => "ACCOUNT_LIMITS",
            RlimitRecord::AccountUsage(_) => "ACCOUNT_USAGE",
        }
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        let json = match self {
            RlimitRecord::Config(config) => serde_json::to_string(config),
            RlimitRecord::State(state) => serde_json::to_string(state),
            RlimitRecord::AccountLimits(row) => serde_json::to_string(row),
            RlimitRecord::AccountUsage(usage) => serde_json::to_string(usage),
        };
        json.map_err(|e| ChainError::ParseError(format!("failed to encode {}: {}", self.kind(), e)))
    }
}

/// Observer of every resource record change. Implementations must not feed
/// anything back into the manager.
pub trait DeepMindLogger: Send + Sync {
    fn on_rlimit_op(&self, op: DeepMindOperation, record: RlimitRecord<'_>);

    fn on_ram_event(&self, _account: Name, _new_usage: u64, _delta: i64) {}
}

/// Writes `DMLOG` lines through the default spdlog logger.
#[derive(Debug, Default)]
pub struct SpdlogDeepMindLogger;

impl DeepMindLogger for SpdlogDeepMindLogger {
    fn on_rlimit_op(&self, op: DeepMindOperation, record: RlimitRecord<'_>) {
        match record.to_json() {
            Ok(json) => spdlog::info!("DMLOG RLIMIT_OP {} {} {}", record.kind(), op.as_str(), json),
            Err(e) => spdlog::warn!("deep mind: {}", e),
        }
    }

    fn on_ram_event(&self, account: Name, new_usage: u64, delta: i64) {
        spdlog::info!("DMLOG RAM_OP {} {} {}", account, new_usage, delta);
    }
}
