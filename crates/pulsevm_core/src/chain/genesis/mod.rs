use pulsevm_constants::{
    BLOCK_CPU_USAGE_AVERAGE_WINDOW_MS, BLOCK_INTERVAL_MS, BLOCK_SIZE_AVERAGE_WINDOW_MS,
    DEFAULT_ELASTIC_CONTRACT_RATE, DEFAULT_ELASTIC_EXPAND_RATE, DEFAULT_MAX_BLOCK_CPU_USAGE,
    DEFAULT_MAX_BLOCK_NET_USAGE, DEFAULT_TARGET_BLOCK_CPU_USAGE_PCT,
    DEFAULT_TARGET_BLOCK_NET_USAGE_PCT, MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER, PERCENT_100,
    eos_percent,
};
use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize};

use crate::chain::{
    block::BlockTimestamp,
    resource::ElasticLimitParameters,
    utils::{make_ratio, pulse_assert},
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChainConfig {
    pub max_block_net_usage: u64,
    pub target_block_net_usage_pct: u32,

    pub max_block_cpu_usage: u32,
    pub target_block_cpu_usage_pct: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            max_block_net_usage: DEFAULT_MAX_BLOCK_NET_USAGE as u64,
            target_block_net_usage_pct: DEFAULT_TARGET_BLOCK_NET_USAGE_PCT,
            max_block_cpu_usage: DEFAULT_MAX_BLOCK_CPU_USAGE,
            target_block_cpu_usage_pct: DEFAULT_TARGET_BLOCK_CPU_USAGE_PCT,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ChainError> {
        pulse_assert(
            self.target_block_net_usage_pct as u64 <= PERCENT_100,
            ChainError::GenesisError("target block net usage percentage cannot exceed 100%".into()),
        )?;
        pulse_assert(
            self.target_block_cpu_usage_pct as u64 <= PERCENT_100,
            ChainError::GenesisError("target block cpu usage percentage cannot exceed 100%".into()),
        )?;
        pulse_assert(
            self.max_block_net_usage > 0 && self.max_block_cpu_usage > 0,
            ChainError::GenesisError("block maxima must be positive".into()),
        )?;
        Ok(())
    }

    /// The `(cpu, net)` elastic parameters a producer hands to
    /// `set_block_parameters` for this configuration.
    pub fn elastic_limit_parameters(&self) -> (ElasticLimitParameters, ElasticLimitParameters) {
        let cpu = ElasticLimitParameters::new(
            eos_percent(
                self.max_block_cpu_usage as u64,
                self.target_block_cpu_usage_pct,
            ),
            self.max_block_cpu_usage as u64,
            BLOCK_CPU_USAGE_AVERAGE_WINDOW_MS / BLOCK_INTERVAL_MS,
            MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER,
            make_ratio(DEFAULT_ELASTIC_CONTRACT_RATE.0, DEFAULT_ELASTIC_CONTRACT_RATE.1),
            make_ratio(DEFAULT_ELASTIC_EXPAND_RATE.0, DEFAULT_ELASTIC_EXPAND_RATE.1),
        );
        let net = ElasticLimitParameters::new(
            eos_percent(self.max_block_net_usage, self.target_block_net_usage_pct),
            self.max_block_net_usage,
            BLOCK_SIZE_AVERAGE_WINDOW_MS / BLOCK_INTERVAL_MS,
            MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER,
            make_ratio(DEFAULT_ELASTIC_CONTRACT_RATE.0, DEFAULT_ELASTIC_CONTRACT_RATE.1),
            make_ratio(DEFAULT_ELASTIC_EXPAND_RATE.0, DEFAULT_ELASTIC_EXPAND_RATE.1),
        );
        (cpu, net)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Genesis {
    initial_timestamp: BlockTimestamp,
    #[serde(default)]
    initial_configuration: ChainConfig,
}

impl Genesis {
    pub fn parse(bytes: &[u8]) -> Result<Self, ChainError> {
        let genesis = std::str::from_utf8(bytes)
            .map_err(|_| ChainError::GenesisError("invalid UTF-8".to_string()))?;
        let genesis: Genesis = serde_json::from_str(genesis)
            .map_err(|e| ChainError::GenesisError(format!("{}", e)))?;
        genesis.validate()?;
        Ok(genesis)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        self.initial_configuration.validate()
    }

    pub fn initial_timestamp(&self) -> &BlockTimestamp {
        &self.initial_timestamp
    }

    pub fn initial_configuration(&self) -> &ChainConfig {
        &self.initial_configuration
    }
}

#[cfg(test)]
mod tests {
    use crate::chain::resource::ResourceLimitsConfig;

    use super::*;

    #[test]
    fn test_default_configuration_matches_default_limits() {
        let (cpu, net) = ChainConfig::default().elastic_limit_parameters();
        let config = ResourceLimitsConfig::default();
        assert_eq!(cpu, config.cpu_limit_parameters);
        assert_eq!(net, config.net_limit_parameters);
    }

    #[test]
    fn test_parse() {
        let genesis = Genesis::parse(
            br#"{
                "initial_timestamp": "2018-06-01T12:00:00.000",
                "initial_configuration": {
                    "max_block_net_usage": 2097152,
                    "target_block_net_usage_pct": 500,
                    "max_block_cpu_usage": 400000,
                    "target_block_cpu_usage_pct": 1000
                }
            }"#,
        )
        .unwrap();
        let (cpu, net) = genesis.initial_configuration().elastic_limit_parameters();
        assert_eq!(cpu.max, 400_000);
        assert_eq!(cpu.target, 40_000);
        assert_eq!(net.target, 104_857);
        assert_eq!(
            genesis.initial_timestamp().to_time_string(),
            "2018-06-01T12:00:00.000"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            Genesis::parse(&[0xff, 0xfe]),
            Err(ChainError::GenesisError(_))
        ));
        assert!(matches!(
            Genesis::parse(br#"{"initial_timestamp": 5}"#),
            Err(ChainError::GenesisError(_))
        ));
        assert!(
            Genesis::parse(
                br#"{
                    "initial_timestamp": "2018-06-01T12:00:00.000",
                    "initial_configuration": {
                        "max_block_net_usage": 1,
                        "target_block_net_usage_pct": 10001,
                        "max_block_cpu_usage": 1,
                        "target_block_cpu_usage_pct": 1
                    }
                }"#
            )
            .is_err()
        );
    }
}
