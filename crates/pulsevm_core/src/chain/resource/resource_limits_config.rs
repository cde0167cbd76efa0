use pulsevm_constants::{
    ACCOUNT_CPU_USAGE_AVERAGE_WINDOW_MS, ACCOUNT_NET_USAGE_AVERAGE_WINDOW_MS, BLOCK_INTERVAL_MS,
};
use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize};

use crate::chain::{genesis::ChainConfig, resource::ElasticLimitParameters, utils::pulse_assert};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLimitsConfig {
    pub cpu_limit_parameters: ElasticLimitParameters,
    pub net_limit_parameters: ElasticLimitParameters,

    pub account_cpu_usage_average_window: u32,
    pub account_net_usage_average_window: u32,
}

impl ResourceLimitsConfig {
    pub fn validate(&self) -> Result<(), ChainError> {
        self.cpu_limit_parameters.validate()?;
        self.net_limit_parameters.validate()?;
        pulse_assert(
            self.account_cpu_usage_average_window > 0,
            ChainError::ResourceLimitException(
                "account cpu usage average window cannot be zero".to_owned(),
            ),
        )?;
        pulse_assert(
            self.account_net_usage_average_window > 0,
            ChainError::ResourceLimitException(
                "account net usage average window cannot be zero".to_owned(),
            ),
        )?;
        Ok(())
    }
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        let (cpu_limit_parameters, net_limit_parameters) =
            ChainConfig::default().elastic_limit_parameters();
        ResourceLimitsConfig {
            cpu_limit_parameters,
            net_limit_parameters,
            account_cpu_usage_average_window: ACCOUNT_CPU_USAGE_AVERAGE_WINDOW_MS
                / BLOCK_INTERVAL_MS,
            account_net_usage_average_window: ACCOUNT_NET_USAGE_AVERAGE_WINDOW_MS
                / BLOCK_INTERVAL_MS,
        }
    }
}
