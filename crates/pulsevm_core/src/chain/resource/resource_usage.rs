use pulsevm_name::Name;
use serde::{Deserialize, Serialize};

use crate::chain::utils::UsageAccumulator;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub owner: Name,

    pub net_usage: UsageAccumulator,
    pub cpu_usage: UsageAccumulator,

    pub ram_usage: u64,
}

impl ResourceUsage {
    pub fn new(owner: Name) -> Self {
        ResourceUsage {
            owner,
            ..Default::default()
        }
    }
}
