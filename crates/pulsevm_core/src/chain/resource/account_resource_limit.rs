use serde::{Deserialize, Serialize};

use crate::chain::block::BlockTimestamp;

/// Query view of one account's CPU or NET standing. Every figure is `-1`
/// when the account is unlimited.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResourceLimit {
    /// quantity used in current window
    pub used: i64,
    /// quantity available in current window (based upon fractional reserve)
    pub available: i64,
    /// max per window under current congestion
    pub max: i64,
    /// last usage timestamp
    pub last_usage_update_time: BlockTimestamp,
    /// `used` decayed to the requested slot
    pub current_used: i64,
}

impl AccountResourceLimit {
    pub fn new(
        used: i64,
        available: i64,
        max: i64,
        last_usage_update_time: BlockTimestamp,
        current_used: i64,
    ) -> Self {
        Self {
            used,
            available,
            max,
            last_usage_update_time,
            current_used,
        }
    }

    pub fn unlimited(last_usage_update_time: BlockTimestamp) -> Self {
        Self::new(-1, -1, -1, last_usage_update_time, -1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.available < 0
    }
}
