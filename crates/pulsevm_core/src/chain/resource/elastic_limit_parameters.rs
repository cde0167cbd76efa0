use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize};

use crate::chain::utils::{Ratio, pulse_assert};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ElasticLimitParameters {
    pub target: u64, // the desired usage
    pub max: u64,    // the maximum usage
    pub periods: u32, // the number of aggregation periods that contribute to the average usage

    pub max_multiplier: u32,      // the multiplier by which virtual space can oversell usage when uncongested
    pub contract_rate: Ratio<u64>, // the rate at which a congested resource contracts its limit
    pub expand_rate: Ratio<u64>,   // the rate at which an uncongested resource expands its limits
}

impl ElasticLimitParameters {
    pub fn new(
        target: u64,
        max: u64,
        periods: u32,
        max_multiplier: u32,
        contract_rate: Ratio<u64>,
        expand_rate: Ratio<u64>,
    ) -> Self {
        ElasticLimitParameters {
            target,
            max,
            periods,
            max_multiplier,
            contract_rate,
            expand_rate,
        }
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        pulse_assert(
            self.periods > 0,
            ChainError::ResourceLimitException(
                "elastic limit parameter 'periods' cannot be zero".to_owned(),
            ),
        )?;
        pulse_assert(
            self.contract_rate.denominator > 0,
            ChainError::ResourceLimitException(
                "elastic limit parameter 'contract_rate' is not a well-defined ratio".to_owned(),
            ),
        )?;
        pulse_assert(
            self.expand_rate.denominator > 0,
            ChainError::ResourceLimitException(
                "elastic limit parameter 'expand_rate' is not a well-defined ratio".to_owned(),
            ),
        )?;
        pulse_assert(
            self.max.checked_mul(self.max_multiplier as u64).is_some(),
            ChainError::ResourceLimitException(
                "elastic limit parameters 'max' * 'max_multiplier' overflows".to_owned(),
            ),
        )?;
        Ok(())
    }

    /// The largest virtual limit the controller may reach.
    pub fn max_virtual_limit(&self) -> u64 {
        self.max.saturating_mul(self.max_multiplier as u64)
    }

    /// Moves `current_limit` one step: contract when the block average is
    /// above target, expand otherwise, then clamp to
    /// `[max, max * max_multiplier]`. Fails on a rate with a zero
    /// denominator, which [`validate`](Self::validate) rejects up front.
    pub fn update_elastic_limit(
        &self,
        current_limit: u64,
        average_usage: u64,
    ) -> Result<u64, ChainError> {
        let rate = if average_usage > self.target {
            self.contract_rate
        } else {
            self.expand_rate
        };
        let result = (current_limit as u128 * rate)?;
        let clamped = result
            .max(self.max as u128)
            .min(self.max_virtual_limit() as u128);
        Ok(clamped as u64)
    }
}
