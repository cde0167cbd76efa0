
#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use pulsevm_constants::MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER;
    use pulsevm_core::{
        ResourceLimitsManager,
        deep_mind::DeepMindLogger,
        error::ChainError,
        genesis::Genesis,
        name::Name,
        resource::{ResourceLimit, ResourceLimitsConfig},
    };

    pub struct Testing {
        pub manager: ResourceLimitsManager,
    }

    impl Testing {
        pub fn new() -> Self {
            Self::with_config(None, None)
        }

        pub fn with_config(
            config: Option<ResourceLimitsConfig>,
            deep_mind: Option<Arc<dyn DeepMindLogger>>,
        ) -> Self {
            let mut manager = ResourceLimitsManager::new(deep_mind);
            manager
                .initialize_database(config)
                .expect("Failed to initialize resource limits");
            Testing { manager }
        }

        /// A manager configured the way a node would be from its genesis file.
        pub fn from_genesis(genesis: &str) -> Result<Self, ChainError> {
            let genesis = Genesis::parse(genesis.as_bytes())?;
            let mut suite = Self::new();
            let (cpu, net) = genesis.initial_configuration().elastic_limit_parameters();
            suite.manager.set_block_parameters(cpu, net)?;
            Ok(suite)
        }

        pub fn create_account(
            &mut self,
            account: Name,
            ram_bytes: i64,
            net_weight: i64,
            cpu_weight: i64,
        ) -> Result<(), ChainError> {
            self.manager.initialize_account(account)?;
            self.set_limits(account, ram_bytes, net_weight, cpu_weight)?;
            Ok(())
        }

        /// Stages limits in the wire form, where `-1` means unlimited.
        pub fn set_limits(
            &mut self,
            account: Name,
            ram_bytes: i64,
            net_weight: i64,
            cpu_weight: i64,
        ) -> Result<bool, ChainError> {
            self.manager.set_account_limits(
                account,
                ResourceLimit::from(ram_bytes),
                ResourceLimit::from(net_weight),
                ResourceLimit::from(cpu_weight),
            )
        }

        pub fn bill(
            &mut self,
            accounts: &[Name],
            cpu_usage: u64,
            net_usage: u64,
            time_slot: u32,
        ) -> Result<(), ChainError> {
            let accounts: BTreeSet<Name> = accounts.iter().copied().collect();
            self.manager
                .add_transaction_usage(&accounts, cpu_usage, net_usage, time_slot)
        }

        /// Settles block `block_num` and promotes pending limits.
        pub fn finish_block(&mut self, block_num: u32) -> Result<(), ChainError> {
            self.manager.process_block_usage(block_num)?;
            self.manager.process_account_limit_updates()
        }

        pub fn cpu_limit(&self, account: Name) -> Result<i64, ChainError> {
            Ok(self
                .manager
                .get_account_cpu_limit(&account, MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER)?
                .0)
        }

        pub fn net_limit(&self, account: Name) -> Result<i64, ChainError> {
            Ok(self
                .manager
                .get_account_net_limit(&account, MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER)?
                .0)
        }
    }

    pub fn name(s: &str) -> Name {
        s.parse().expect("invalid name")
    }

    pub const fn expected_elastic_iterations(
        from: u64,
        to: u64,
        rate_num: u64,
        rate_den: u64,
    ) -> u64 {
        let mut result = 0;
        let mut cur = from;
        while (from < to && cur < to) || (from > to && cur > to) {
            cur = cur * rate_num / rate_den;
            result += 1;
        }
        result
    }

    pub const fn expected_exponential_average_iterations(
        from: u64,
        to: u64,
        value: u64,
        window_size: u64,
    ) -> u64 {
        let mut result = 0;
        let mut cur = from;
        while (from < to && cur < to) || (from > to && cur > to) {
            cur = cur * (window_size - 1) / window_size;
            cur += value / window_size;
            result += 1;
        }
        result
    }
}
