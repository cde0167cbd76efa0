use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize};

use crate::chain::{resource::ResourceLimitsConfig, utils::UsageAccumulator};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceLimitsState {
    /// Decaying average of block NET usage, windowed by the NET `periods`.
    pub average_block_net_usage: UsageAccumulator,
    /// Decaying average of block CPU usage, windowed by the CPU `periods`.
    pub average_block_cpu_usage: UsageAccumulator,

    /// Usage accumulated by the block under construction.
    pub pending_net_usage: u64,
    pub pending_cpu_usage: u64,

    /// Sums over every account's committed limits.
    pub total_net_weight: u64,
    pub total_cpu_weight: u64,
    pub total_ram_bytes: u64,

    /// Current elastic block capacity; between `max` and
    /// `max * max_multiplier` of the matching parameters.
    pub virtual_net_limit: u64,
    pub virtual_cpu_limit: u64,
}

impl ResourceLimitsState {
    /// The chain starts "congested" (slow start) with the virtual limits at
    /// their floor.
    pub fn new(config: &ResourceLimitsConfig) -> Self {
        ResourceLimitsState {
            virtual_net_limit: config.net_limit_parameters.max,
            virtual_cpu_limit: config.cpu_limit_parameters.max,
            ..Default::default()
        }
    }

    pub fn update_virtual_cpu_limit(&mut self, config: &ResourceLimitsConfig) -> Result<(), ChainError> {
        let parameters = &config.cpu_limit_parameters;
        let average = self
            .average_block_cpu_usage
            .average(parameters.periods as u64)?;
        self.virtual_cpu_limit = parameters.update_elastic_limit(self.virtual_cpu_limit, average)?;
        Ok(())
    }

    pub fn update_virtual_net_limit(&mut self, config: &ResourceLimitsConfig) -> Result<(), ChainError> {
        let parameters = &config.net_limit_parameters;
        let average = self
            .average_block_net_usage
            .average(parameters.periods as u64)?;
        self.virtual_net_limit = parameters.update_elastic_limit(self.virtual_net_limit, average)?;
        Ok(())
    }
}
