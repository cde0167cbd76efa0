use std::fmt;

use pulsevm_error::ChainError;
use pulsevm_name::Name;
use serde::{Deserialize, Serialize};

/// A RAM byte quota or a CPU/NET weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLimit {
    #[default]
    Unlimited,
    Limited(u64),
}

impl ResourceLimit {
    pub const fn is_unlimited(&self) -> bool {
        matches!(self, ResourceLimit::Unlimited)
    }

    pub const fn limit(&self) -> Option<u64> {
        match self {
            ResourceLimit::Unlimited => None,
            ResourceLimit::Limited(value) => Some(*value),
        }
    }

    /// Wire form used by system contracts and the query API, where any
    /// negative value means unlimited.
    pub const fn from_i64(value: i64) -> Self {
        if value < 0 {
            ResourceLimit::Unlimited
        } else {
            ResourceLimit::Limited(value as u64)
        }
    }

    pub fn to_i64(&self) -> i64 {
        match self {
            ResourceLimit::Unlimited => -1,
            ResourceLimit::Limited(value) => i64::try_from(*value).unwrap_or(i64::MAX),
        }
    }
}

impl From<i64> for ResourceLimit {
    fn from(value: i64) -> Self {
        ResourceLimit::from_i64(value)
    }
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLimit::Unlimited => f.write_str("unlimited"),
            ResourceLimit::Limited(value) => write!(f, "{}", value),
        }
    }
}

/// One account's entitlement values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub ram_bytes: ResourceLimit,
    pub net_weight: ResourceLimit,
    pub cpu_weight: ResourceLimit,
}

impl ResourceLimits {
    pub fn new(ram_bytes: ResourceLimit, net_weight: ResourceLimit, cpu_weight: ResourceLimit) -> Self {
        ResourceLimits {
            ram_bytes,
            net_weight,
            cpu_weight,
        }
    }
}

/// The committed entitlement of an account and, while a change is waiting
/// for the next block boundary, its pending replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceLimitsObject {
    pub owner: Name,
    pub limits: ResourceLimits,
    pub pending: Option<ResourceLimits>,
}

impl ResourceLimitsObject {
    pub fn new(owner: Name) -> Self {
        ResourceLimitsObject {
            owner,
            limits: ResourceLimits::default(),
            pending: None,
        }
    }

    /// What the account will have after the next promotion.
    pub fn latest(&self) -> &ResourceLimits {
        self.pending.as_ref().unwrap_or(&self.limits)
    }

    /// Replaces the committed values with the pending ones, moving `totals`
    /// (`ram_bytes`, `net_weight`, `cpu_weight`) by exactly the difference.
    /// Returns `false` if there was nothing to promote. On error nothing is
    /// modified.
    pub fn promote_pending(&mut self, totals: [&mut u64; 3]) -> Result<bool, ChainError> {
        let Some(pending) = self.pending else {
            return Ok(false);
        };

        let [total_ram_bytes, total_net_weight, total_cpu_weight] = totals;
        let ram = apply_delta(*total_ram_bytes, self.limits.ram_bytes, pending.ram_bytes, "ram_bytes")?;
        let net = apply_delta(*total_net_weight, self.limits.net_weight, pending.net_weight, "net_weight")?;
        let cpu = apply_delta(*total_cpu_weight, self.limits.cpu_weight, pending.cpu_weight, "cpu_weight")?;

        *total_ram_bytes = ram;
        *total_net_weight = net;
        *total_cpu_weight = cpu;
        self.limits = pending;
        self.pending = None;
        Ok(true)
    }
}

fn apply_delta(
    total: u64,
    old: ResourceLimit,
    new: ResourceLimit,
    which: &str,
) -> Result<u64, ChainError> {
    let mut total = total;
    if let ResourceLimit::Limited(value) = old {
        total = total.checked_sub(value).ok_or_else(|| {
            ChainError::RateLimitingStateInconsistent(format!(
                "underflow when reverting old value to {}",
                which
            ))
        })?;
    }
    if let ResourceLimit::Limited(value) = new {
        total = total.checked_add(value).ok_or_else(|| {
            ChainError::RateLimitingStateInconsistent(format!(
                "overflow when applying new value to {}",
                which
            ))
        })?;
    }
    Ok(total)
}
