use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use pulsevm_constants::MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER;
use pulsevm_error::ChainError;
use pulsevm_name::Name;
use spdlog::{debug, error, info};

use crate::chain::{
    block::BlockTimestamp,
    deep_mind::{AccountLimitsRow, DeepMindLogger, DeepMindOperation, RlimitRecord},
    resource::{
        AccountResourceLimit, ElasticLimitParameters, ResourceLimit, ResourceLimits,
        ResourceLimitsConfig, ResourceLimitsObject, ResourceLimitsState, ResourceUsage,
    },
    snapshot::{SnapshotReader, SnapshotWriter, read_rows, write_rows},
    undo::{ObjectChange, UndoStack},
    utils::{UsageAccumulator, pulse_assert},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Cpu,
    Net,
}

impl Resource {
    fn weight(self, limits: &ResourceLimits) -> ResourceLimit {
        match self {
            Resource::Cpu => limits.cpu_weight,
            Resource::Net => limits.net_weight,
        }
    }

    fn total_weight(self, state: &ResourceLimitsState) -> u64 {
        match self {
            Resource::Cpu => state.total_cpu_weight,
            Resource::Net => state.total_net_weight,
        }
    }

    fn virtual_limit(self, state: &ResourceLimitsState) -> u64 {
        match self {
            Resource::Cpu => state.virtual_cpu_limit,
            Resource::Net => state.virtual_net_limit,
        }
    }

    fn parameters(self, config: &ResourceLimitsConfig) -> &ElasticLimitParameters {
        match self {
            Resource::Cpu => &config.cpu_limit_parameters,
            Resource::Net => &config.net_limit_parameters,
        }
    }

    fn window(self, config: &ResourceLimitsConfig) -> u64 {
        match self {
            Resource::Cpu => config.account_cpu_usage_average_window as u64,
            Resource::Net => config.account_net_usage_average_window as u64,
        }
    }

    fn usage(self, usage: &ResourceUsage) -> &UsageAccumulator {
        match self {
            Resource::Cpu => &usage.cpu_usage,
            Resource::Net => &usage.net_usage,
        }
    }

    fn exceeded(self, account: Name, used: u128, allowed: u128) -> ChainError {
        let account = account.to_string();
        match self {
            Resource::Cpu => ChainError::TxCpuUsageExceeded {
                account,
                used,
                allowed,
            },
            Resource::Net => ChainError::TxNetUsageExceeded {
                account,
                used,
                allowed,
            },
        }
    }
}

/// `capacity * weight / total_weight` rounded down, exact for any
/// `weight <= total_weight`.
fn weighted_share(capacity: u128, weight: u64, total_weight: u64) -> u128 {
    let (weight, total_weight) = (weight as u128, total_weight as u128);
    (capacity / total_weight)
        .saturating_mul(weight)
        .saturating_add(capacity % total_weight * weight / total_weight)
}

fn downgrade_cast(value: u128) -> Result<i64, ChainError> {
    i64::try_from(value).map_err(|_| {
        ChainError::InternalError(Some(format!(
            "value {} does not fit into a signed 64-bit integer",
            value
        )))
    })
}

/// Resource accounting for accounts and blocks: per-account weighted
/// admission, elastic block capacity and the RAM ledger.
///
/// Entitlement changes are staged as pending records and only become visible
/// to admission when [`process_account_limit_updates`] runs at the end of a
/// block. Every mutation is recorded in the undo stack while a session is
/// open, and reported to the deep-mind observer if one is attached.
///
/// [`process_account_limit_updates`]: ResourceLimitsManager::process_account_limit_updates
pub struct ResourceLimitsManager {
    config: Option<ResourceLimitsConfig>,
    state: Option<ResourceLimitsState>,
    limits: BTreeMap<Name, ResourceLimitsObject>,
    usage: BTreeMap<Name, ResourceUsage>,
    pending_limits: BTreeSet<Name>,
    undo: UndoStack,
    deep_mind: Option<Arc<dyn DeepMindLogger>>,
}

impl Default for ResourceLimitsManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ResourceLimitsManager {
    pub fn new(deep_mind: Option<Arc<dyn DeepMindLogger>>) -> Self {
        Self {
            config: None,
            state: None,
            limits: BTreeMap::new(),
            usage: BTreeMap::new(),
            pending_limits: BTreeSet::new(),
            undo: UndoStack::new(),
            deep_mind,
        }
    }

    pub fn initialize_database(
        &mut self,
        config: Option<ResourceLimitsConfig>,
    ) -> Result<(), ChainError> {
        pulse_assert(
            self.config.is_none() && self.state.is_none(),
            ChainError::DatabaseError("resource limits database already initialized".into()),
        )?;
        let config = config.unwrap_or_default();
        config.validate()?;
        let state = ResourceLimitsState::new(&config);

        info!(
            "initializing resource limits: virtual cpu limit {}, virtual net limit {}",
            state.virtual_cpu_limit, state.virtual_net_limit
        );
        self.put_config(config);
        self.put_state(state);
        Ok(())
    }

    pub fn config(&self) -> Result<&ResourceLimitsConfig, ChainError> {
        self.config.as_ref().ok_or_else(|| {
            ChainError::DatabaseError("resource limits config not initialized".into())
        })
    }

    pub fn state(&self) -> Result<&ResourceLimitsState, ChainError> {
        self.state.as_ref().ok_or_else(|| {
            ChainError::DatabaseError("resource limits state not initialized".into())
        })
    }

    fn limits_of(&self, account: &Name) -> Result<&ResourceLimitsObject, ChainError> {
        self.limits.get(account).ok_or_else(|| {
            ChainError::DatabaseError(format!(
                "resource limits for account {} not found",
                account
            ))
        })
    }

    pub fn get_account_usage(&self, account: &Name) -> Result<&ResourceUsage, ChainError> {
        self.usage.get(account).ok_or_else(|| {
            ChainError::DatabaseError(format!("resource usage for account {} not found", account))
        })
    }

    pub fn initialize_account(&mut self, account: Name) -> Result<(), ChainError> {
        pulse_assert(
            !self.limits.contains_key(&account) && !self.usage.contains_key(&account),
            ChainError::DatabaseError(format!(
                "resource limits for account {} already exist",
                account
            )),
        )?;
        self.put_limits(ResourceLimitsObject::new(account));
        self.put_usage(ResourceUsage::new(account));
        Ok(())
    }

    /// Replaces the elastic parameters. Parameters equal to the current ones
    /// leave the config untouched.
    pub fn set_block_parameters(
        &mut self,
        cpu_limit_parameters: ElasticLimitParameters,
        net_limit_parameters: ElasticLimitParameters,
    ) -> Result<(), ChainError> {
        cpu_limit_parameters.validate()?;
        net_limit_parameters.validate()?;
        let config = self.config()?;
        if config.cpu_limit_parameters == cpu_limit_parameters
            && config.net_limit_parameters == net_limit_parameters
        {
            return Ok(());
        }

        info!(
            "updating block parameters: cpu max {} target {}, net max {} target {}",
            cpu_limit_parameters.max,
            cpu_limit_parameters.target,
            net_limit_parameters.max,
            net_limit_parameters.target
        );
        let mut config = config.clone();
        config.cpu_limit_parameters = cpu_limit_parameters;
        config.net_limit_parameters = net_limit_parameters;
        self.put_config(config);
        Ok(())
    }

    /// Decays the usage of `accounts` up to `time_slot` without billing
    /// anything.
    pub fn update_account_usage(
        &mut self,
        accounts: &BTreeSet<Name>,
        time_slot: u32,
    ) -> Result<(), ChainError> {
        let config = self.config()?;
        let mut updated = Vec::with_capacity(accounts.len());
        for account in accounts {
            let mut usage = self.get_account_usage(account)?.clone();
            usage
                .net_usage
                .add(0, time_slot, Resource::Net.window(config))?;
            usage
                .cpu_usage
                .add(0, time_slot, Resource::Cpu.window(config))?;
            updated.push(usage);
        }

        for usage in updated {
            self.put_usage(usage);
        }
        Ok(())
    }

    /// Bills `cpu_usage` and `net_usage` to every account in `accounts` and
    /// to the block under construction.
    ///
    /// Each account must stay within its weighted share of the virtual
    /// capacity over its averaging window; CPU is checked before NET. The
    /// block total must then stay within the hard block maximum. Either
    /// everything is billed or nothing is.
    pub fn add_transaction_usage(
        &mut self,
        accounts: &BTreeSet<Name>,
        cpu_usage: u64,
        net_usage: u64,
        time_slot: u32,
    ) -> Result<(), ChainError> {
        let config = self.config()?;
        let state = self.state()?;

        let mut updated = Vec::with_capacity(accounts.len());
        for account in accounts {
            let limits = &self.limits_of(account)?.limits;
            let mut usage = self.get_account_usage(account)?.clone();
            usage
                .net_usage
                .add(net_usage, time_slot, Resource::Net.window(config))?;
            usage
                .cpu_usage
                .add(cpu_usage, time_slot, Resource::Cpu.window(config))?;

            for resource in [Resource::Cpu, Resource::Net] {
                let ResourceLimit::Limited(weight) = resource.weight(limits) else {
                    continue;
                };
                let total_weight = resource.total_weight(state);
                if total_weight == 0 {
                    continue;
                }

                let window = resource.window(config);
                let capacity_in_window = resource.virtual_limit(state) as u128 * window as u128;
                let allowed = weighted_share(capacity_in_window, weight, total_weight);
                let used = resource.usage(&usage).value_in_window();
                if used > allowed {
                    debug!(
                        "rejecting transaction: {:?} usage of {} is {} in window, allowed {}",
                        resource, account, used, allowed
                    );
                    return Err(resource.exceeded(*account, used, allowed));
                }
            }
            updated.push(usage);
        }

        let mut new_state = state.clone();
        new_state.pending_cpu_usage = state
            .pending_cpu_usage
            .checked_add(cpu_usage)
            .filter(|pending| *pending <= config.cpu_limit_parameters.max)
            .ok_or_else(|| {
                ChainError::BlockResourceExhausted("Block has insufficient cpu resources".into())
            })?;
        new_state.pending_net_usage = state
            .pending_net_usage
            .checked_add(net_usage)
            .filter(|pending| *pending <= config.net_limit_parameters.max)
            .ok_or_else(|| {
                ChainError::BlockResourceExhausted("Block has insufficient net resources".into())
            })?;

        for usage in updated {
            self.put_usage(usage);
        }
        self.put_state(new_state);
        Ok(())
    }

    pub fn add_pending_ram_usage(&mut self, account: Name, ram_delta: i64) -> Result<(), ChainError> {
        if ram_delta == 0 {
            return Ok(());
        }

        let mut usage = self.get_account_usage(&account)?.clone();
        usage.ram_usage = usage.ram_usage.checked_add_signed(ram_delta).ok_or_else(|| {
            ChainError::TransactionError(if ram_delta > 0 {
                "Ram usage delta would overflow UINT64_MAX".to_string()
            } else {
                "Ram usage delta would underflow UINT64_MAX".to_string()
            })
        })?;

        if let Some(dm) = &self.deep_mind {
            dm.on_ram_event(account, usage.ram_usage, ram_delta);
        }
        self.put_usage(usage);
        Ok(())
    }

    /// Fails if the committed RAM quota of `account` is below its usage.
    pub fn verify_account_ram_usage(&self, account: &Name) -> Result<(), ChainError> {
        let limits = &self.limits_of(account)?.limits;
        let usage = self.get_account_usage(account)?;

        if let ResourceLimit::Limited(ram_bytes) = limits.ram_bytes {
            pulse_assert(
                usage.ram_usage <= ram_bytes,
                ChainError::RamUsageExceeded {
                    account: account.to_string(),
                    needs: usage.ram_usage,
                    available: ram_bytes,
                },
            )?;
        }
        Ok(())
    }

    pub fn get_account_ram_usage(&self, account: &Name) -> Result<u64, ChainError> {
        Ok(self.get_account_usage(account)?.ram_usage)
    }

    /// Stages new limits for `account`; they take effect at the next call to
    /// [`process_account_limit_updates`](Self::process_account_limit_updates).
    ///
    /// Returns whether `ram_bytes` lowers the committed RAM quota.
    pub fn set_account_limits(
        &mut self,
        account: Name,
        ram_bytes: ResourceLimit,
        net_weight: ResourceLimit,
        cpu_weight: ResourceLimit,
    ) -> Result<bool, ChainError> {
        let mut object = self.limits_of(&account)?.clone();

        let decreased_limit = match (ram_bytes, object.limits.ram_bytes) {
            (ResourceLimit::Unlimited, _) => false,
            (ResourceLimit::Limited(_), ResourceLimit::Unlimited) => true,
            (ResourceLimit::Limited(new), ResourceLimit::Limited(old)) => new < old,
        };

        object.pending = Some(ResourceLimits::new(ram_bytes, net_weight, cpu_weight));
        if self.pending_limits.insert(account) {
            self.undo.record(ObjectChange::PendingLimits(account, false));
        }
        self.put_limits(object);
        Ok(decreased_limit)
    }

    /// Limits as they will be after the next promotion.
    pub fn get_account_limits(&self, account: &Name) -> Result<ResourceLimits, ChainError> {
        Ok(*self.limits_of(account)?.latest())
    }

    pub fn is_unlimited_cpu(&self, account: &Name) -> bool {
        self.limits
            .get(account)
            .is_some_and(|object| object.limits.cpu_weight.is_unlimited())
    }

    /// Promotes every staged limit change, keeping the weight and RAM totals
    /// equal to the sum of the committed values.
    pub fn process_account_limit_updates(&mut self) -> Result<(), ChainError> {
        let mut state = self.state()?.clone();

        let mut promoted = Vec::with_capacity(self.pending_limits.len());
        for account in &self.pending_limits {
            let mut object = self.limits_of(account)?.clone();
            object
                .promote_pending([
                    &mut state.total_ram_bytes,
                    &mut state.total_net_weight,
                    &mut state.total_cpu_weight,
                ])
                .inspect_err(|e| error!("failed to promote limits of {}: {}", account, e))?;
            promoted.push(object);
        }

        debug!(
            "promoted {} pending limits: total cpu weight {}, total net weight {}, total ram bytes {}",
            promoted.len(),
            state.total_cpu_weight,
            state.total_net_weight,
            state.total_ram_bytes
        );
        for object in promoted {
            self.pending_limits.remove(&object.owner);
            self.undo
                .record(ObjectChange::PendingLimits(object.owner, true));
            self.put_limits(object);
        }
        self.put_state(state);
        Ok(())
    }

    /// Settles the block: folds the pending usage into the block averages,
    /// moves the virtual limits one step and clears the pending usage.
    pub fn process_block_usage(&mut self, block_num: u32) -> Result<(), ChainError> {
        let config = self.config()?;
        let mut state = self.state()?.clone();

        state.average_block_cpu_usage.add(
            state.pending_cpu_usage,
            block_num,
            config.cpu_limit_parameters.periods as u64,
        )?;
        state.update_virtual_cpu_limit(config)?;
        state.pending_cpu_usage = 0;

        state.average_block_net_usage.add(
            state.pending_net_usage,
            block_num,
            config.net_limit_parameters.periods as u64,
        )?;
        state.update_virtual_net_limit(config)?;
        state.pending_net_usage = 0;

        debug!(
            "block {} settled: virtual cpu limit {}, virtual net limit {}",
            block_num, state.virtual_cpu_limit, state.virtual_net_limit
        );
        self.put_state(state);
        Ok(())
    }

    pub fn get_total_cpu_weight(&self) -> Result<u64, ChainError> {
        Ok(self.state()?.total_cpu_weight)
    }

    pub fn get_total_net_weight(&self) -> Result<u64, ChainError> {
        Ok(self.state()?.total_net_weight)
    }

    pub fn get_virtual_block_cpu_limit(&self) -> Result<u64, ChainError> {
        Ok(self.state()?.virtual_cpu_limit)
    }

    pub fn get_virtual_block_net_limit(&self) -> Result<u64, ChainError> {
        Ok(self.state()?.virtual_net_limit)
    }

    /// Room left in the block under construction.
    pub fn get_block_cpu_limit(&self) -> Result<u64, ChainError> {
        let state = self.state()?;
        Ok(self
            .config()?
            .cpu_limit_parameters
            .max
            .saturating_sub(state.pending_cpu_usage))
    }

    pub fn get_block_net_limit(&self) -> Result<u64, ChainError> {
        let state = self.state()?;
        Ok(self
            .config()?
            .net_limit_parameters
            .max
            .saturating_sub(state.pending_net_usage))
    }

    pub fn get_account_cpu_limit(
        &self,
        account: &Name,
        greylist_limit: u32,
    ) -> Result<(i64, bool), ChainError> {
        let (limit, greylisted) = self.get_account_cpu_limit_ex(account, greylist_limit, None)?;
        Ok((limit.available, greylisted))
    }

    pub fn get_account_net_limit(
        &self,
        account: &Name,
        greylist_limit: u32,
    ) -> Result<(i64, bool), ChainError> {
        let (limit, greylisted) = self.get_account_net_limit_ex(account, greylist_limit, None)?;
        Ok((limit.available, greylisted))
    }

    pub fn get_account_cpu_limit_ex(
        &self,
        account: &Name,
        greylist_limit: u32,
        current_time: Option<BlockTimestamp>,
    ) -> Result<(AccountResourceLimit, bool), ChainError> {
        self.account_limit_ex(Resource::Cpu, account, greylist_limit, current_time)
    }

    pub fn get_account_net_limit_ex(
        &self,
        account: &Name,
        greylist_limit: u32,
        current_time: Option<BlockTimestamp>,
    ) -> Result<(AccountResourceLimit, bool), ChainError> {
        self.account_limit_ex(Resource::Net, account, greylist_limit, current_time)
    }

    /// Standing of `account` against the same share admission enforces.
    /// A `greylist_limit` below the maximum multiplier caps the capacity at
    /// `max * greylist_limit`; the flag reports whether that cap applied.
    /// With `current_time` after the last update, `current_used` is the
    /// usage decayed to that slot.
    fn account_limit_ex(
        &self,
        resource: Resource,
        account: &Name,
        greylist_limit: u32,
        current_time: Option<BlockTimestamp>,
    ) -> Result<(AccountResourceLimit, bool), ChainError> {
        let config = self.config()?;
        let state = self.state()?;
        let usage = resource.usage(self.get_account_usage(account)?);
        let limits = &self.limits_of(account)?.limits;
        let last_usage_update_time = BlockTimestamp::new(usage.last_ordinal);

        let total_weight = resource.total_weight(state);
        let weight = match resource.weight(limits) {
            ResourceLimit::Limited(weight) if total_weight > 0 => weight,
            _ => return Ok((AccountResourceLimit::unlimited(last_usage_update_time), false)),
        };

        let window = resource.window(config);
        let virtual_limit = resource.virtual_limit(state);
        let mut greylisted = false;
        let mut capacity_limit = virtual_limit;
        if greylist_limit < MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER {
            let greylisted_limit = resource
                .parameters(config)
                .max
                .saturating_mul(greylist_limit as u64);
            if greylisted_limit < virtual_limit {
                capacity_limit = greylisted_limit;
                greylisted = true;
            }
        }

        let max_in_window = weighted_share(capacity_limit as u128 * window as u128, weight, total_weight);
        let used_in_window = usage.value_in_window();

        let used = downgrade_cast(used_in_window)?;
        let mut current_used = used;
        if let Some(current_time) = current_time {
            if current_time.slot > usage.last_ordinal {
                let mut projected = *usage;
                projected.add(0, current_time.slot, window)?;
                current_used = downgrade_cast(projected.value_in_window())?;
            }
        }

        let limit = AccountResourceLimit::new(
            used,
            downgrade_cast(max_in_window.saturating_sub(used_in_window))?,
            downgrade_cast(max_in_window)?,
            last_usage_update_time,
            current_used,
        );
        Ok((limit, greylisted))
    }

    /// Opens a nested undo session and returns the new depth.
    pub fn start_undo_session(&mut self) -> usize {
        self.undo.start_session()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.depth()
    }

    /// Reverts every change made since the innermost session was opened.
    pub fn undo(&mut self) -> Result<(), ChainError> {
        for change in self.undo.pop()? {
            match change {
                ObjectChange::Config(config) => self.config = config,
                ObjectChange::State(state) => self.state = state,
                ObjectChange::Limits(account, Some(object)) => {
                    self.limits.insert(account, object);
                }
                ObjectChange::Limits(account, None) => {
                    self.limits.remove(&account);
                }
                ObjectChange::Usage(account, Some(usage)) => {
                    self.usage.insert(account, usage);
                }
                ObjectChange::Usage(account, None) => {
                    self.usage.remove(&account);
                }
                ObjectChange::PendingLimits(account, true) => {
                    self.pending_limits.insert(account);
                }
                ObjectChange::PendingLimits(account, false) => {
                    self.pending_limits.remove(&account);
                }
            }
        }
        Ok(())
    }

    pub fn squash(&mut self) -> Result<(), ChainError> {
        self.undo.squash()
    }

    pub fn commit(&mut self) {
        self.undo.commit()
    }

    pub fn add_to_snapshot(&self, writer: &mut dyn SnapshotWriter) -> Result<(), ChainError> {
        write_rows(writer, self.limits.values())?;
        write_rows(writer, self.usage.values())?;
        write_rows(writer, [self.state()?])?;
        write_rows(writer, [self.config()?])?;
        Ok(())
    }

    /// Replaces all records with the snapshot contents.
    pub fn read_from_snapshot(&mut self, reader: &dyn SnapshotReader) -> Result<(), ChainError> {
        pulse_assert(
            !self.undo.is_active(),
            ChainError::SnapshotError("cannot load a snapshot inside an undo session".into()),
        )?;

        let config = single_row::<ResourceLimitsConfig>(read_rows(reader)?)?;
        config.validate()?;
        let state = single_row::<ResourceLimitsState>(read_rows(reader)?)?;

        let mut limits = BTreeMap::new();
        for object in read_rows::<ResourceLimitsObject>(reader)? {
            let owner = object.owner;
            pulse_assert(
                limits.insert(owner, object).is_none(),
                ChainError::SnapshotError(format!("duplicate resource limits for {}", owner)),
            )?;
        }
        let mut usage = BTreeMap::new();
        for object in read_rows::<ResourceUsage>(reader)? {
            let owner = object.owner;
            pulse_assert(
                limits.contains_key(&owner) && usage.insert(owner, object).is_none(),
                ChainError::SnapshotError(format!("unexpected resource usage for {}", owner)),
            )?;
        }
        pulse_assert(
            limits.len() == usage.len(),
            ChainError::SnapshotError("resource limits and usage rows do not match".into()),
        )?;

        self.pending_limits = limits
            .values()
            .filter(|object| object.pending.is_some())
            .map(|object| object.owner)
            .collect();
        info!("loaded resource limits for {} accounts from snapshot", limits.len());
        self.limits = limits;
        self.usage = usage;
        self.state = Some(state);
        self.config = Some(config);
        Ok(())
    }

    fn emit(&self, op: DeepMindOperation, record: RlimitRecord<'_>) {
        if let Some(dm) = &self.deep_mind {
            dm.on_rlimit_op(op, record);
        }
    }

    fn operation<T>(previous: &Option<T>) -> DeepMindOperation {
        if previous.is_some() {
            DeepMindOperation::Update
        } else {
            DeepMindOperation::Insert
        }
    }

    fn put_config(&mut self, config: ResourceLimitsConfig) {
        self.emit(Self::operation(&self.config), RlimitRecord::Config(&config));
        let previous = self.config.replace(config);
        self.undo.record(ObjectChange::Config(previous));
    }

    fn put_state(&mut self, state: ResourceLimitsState) {
        self.emit(Self::operation(&self.state), RlimitRecord::State(&state));
        let previous = self.state.replace(state);
        self.undo.record(ObjectChange::State(previous));
    }

    fn put_limits(&mut self, object: ResourceLimitsObject) {
        let owner = object.owner;
        let row = AccountLimitsRow::new(owner, object.latest());
        let previous = self.limits.insert(owner, object);
        self.emit(Self::operation(&previous), RlimitRecord::AccountLimits(row));
        self.undo.record(ObjectChange::Limits(owner, previous));
    }

    fn put_usage(&mut self, usage: ResourceUsage) {
        let owner = usage.owner;
        self.emit(
            Self::operation(&self.usage.get(&owner)),
            RlimitRecord::AccountUsage(&usage),
        );
        let previous = self.usage.insert(owner, usage);
        self.undo.record(ObjectChange::Usage(owner, previous));
    }
}

fn single_row<T>(rows: Vec<T>) -> Result<T, ChainError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(row),
        _ => Err(ChainError::SnapshotError(
            "expected exactly one row in singleton section".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::chain::snapshot::JsonSnapshot;

    use super::*;

    fn account(n: u64) -> Name {
        Name::new(n)
    }

    fn manager() -> ResourceLimitsManager {
        let mut manager = ResourceLimitsManager::default();
        manager.initialize_database(None).unwrap();
        manager
    }

    #[test]
    fn test_weighted_share_is_exact() {
        assert_eq!(weighted_share(100, 1, 3), 33);
        assert_eq!(weighted_share(100, 3, 3), 100);
        let capacity = u64::MAX as u128 * u32::MAX as u128;
        assert_eq!(
            weighted_share(capacity, u64::MAX - 1, u64::MAX),
            capacity - capacity / u64::MAX as u128
        );
    }

    #[test]
    fn test_uninitialized_database() {
        let manager = ResourceLimitsManager::default();
        assert!(matches!(
            manager.get_virtual_block_cpu_limit(),
            Err(ChainError::DatabaseError(_))
        ));
        let mut manager = manager;
        manager.initialize_database(None).unwrap();
        assert!(manager.initialize_database(None).is_err());
    }

    #[test]
    fn test_initialize_account_twice() {
        let mut manager = manager();
        manager.initialize_account(account(1)).unwrap();
        assert!(matches!(
            manager.initialize_account(account(1)),
            Err(ChainError::DatabaseError(_))
        ));
    }

    #[test]
    fn test_pending_limits_do_not_affect_totals() {
        let mut manager = manager();
        manager.initialize_account(account(1)).unwrap();
        let decreased = manager
            .set_account_limits(
                account(1),
                ResourceLimit::Limited(100),
                ResourceLimit::Limited(2),
                ResourceLimit::Limited(3),
            )
            .unwrap();
        assert!(decreased);
        assert_eq!(manager.get_total_cpu_weight().unwrap(), 0);
        assert!(manager.is_unlimited_cpu(&account(1)));
        assert_eq!(
            manager.get_account_limits(&account(1)).unwrap().cpu_weight,
            ResourceLimit::Limited(3)
        );

        manager.process_account_limit_updates().unwrap();
        assert_eq!(manager.get_total_cpu_weight().unwrap(), 3);
        assert_eq!(manager.get_total_net_weight().unwrap(), 2);
        assert_eq!(manager.state().unwrap().total_ram_bytes, 100);
        assert!(!manager.is_unlimited_cpu(&account(1)));

        let decreased = manager
            .set_account_limits(
                account(1),
                ResourceLimit::Limited(200),
                ResourceLimit::Unlimited,
                ResourceLimit::Unlimited,
            )
            .unwrap();
        assert!(!decreased);
        manager.process_account_limit_updates().unwrap();
        assert_eq!(manager.get_total_cpu_weight().unwrap(), 0);
        assert_eq!(manager.state().unwrap().total_ram_bytes, 200);
    }

    #[test]
    fn test_rejected_transaction_changes_nothing() {
        let mut manager = manager();
        for n in [1, 2] {
            manager.initialize_account(account(n)).unwrap();
            manager
                .set_account_limits(
                    account(n),
                    ResourceLimit::Unlimited,
                    ResourceLimit::Limited(1),
                    ResourceLimit::Limited(1),
                )
                .unwrap();
        }
        manager.process_account_limit_updates().unwrap();

        let state = manager.state().unwrap().clone();
        let usage = manager.get_account_usage(&account(1)).unwrap().clone();
        let accounts = BTreeSet::from([account(1), account(2)]);
        let err = manager
            .add_transaction_usage(&accounts, 0, 2_000_000, 7)
            .unwrap_err();
        assert!(err.is_block_exhausted());
        assert_eq!(manager.state().unwrap(), &state);
        assert_eq!(manager.get_account_usage(&account(1)).unwrap(), &usage);
    }

    #[test]
    fn test_later_account_failure_changes_nothing() {
        let mut manager = ResourceLimitsManager::default();
        let config = ResourceLimitsConfig {
            account_cpu_usage_average_window: 1,
            ..Default::default()
        };
        manager.initialize_database(Some(config)).unwrap();
        for (n, cpu_weight) in [(1, 3), (2, 1)] {
            manager.initialize_account(account(n)).unwrap();
            manager
                .set_account_limits(
                    account(n),
                    ResourceLimit::Unlimited,
                    ResourceLimit::Unlimited,
                    ResourceLimit::Limited(cpu_weight),
                )
                .unwrap();
        }
        manager.process_account_limit_updates().unwrap();

        let state = manager.state().unwrap().clone();
        let first = manager.get_account_usage(&account(1)).unwrap().clone();
        let second = manager.get_account_usage(&account(2)).unwrap().clone();

        // 60000 fits the first share of 150000 but not the second of 50000
        let accounts = BTreeSet::from([account(1), account(2)]);
        let err = manager
            .add_transaction_usage(&accounts, 60_000, 0, 1)
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::TxCpuUsageExceeded {
                account: account(2).to_string(),
                used: 60_000,
                allowed: 50_000,
            }
        );
        assert_eq!(manager.state().unwrap(), &state);
        assert_eq!(manager.get_account_usage(&account(1)).unwrap(), &first);
        assert_eq!(manager.get_account_usage(&account(2)).unwrap(), &second);

        manager
            .add_transaction_usage(&BTreeSet::from([account(1)]), 60_000, 0, 1)
            .unwrap();
        assert_eq!(
            manager.get_account_usage(&account(1)).unwrap().cpu_usage.value_in_window(),
            60_000
        );
    }

    #[test]
    fn test_undo_restores_everything() {
        let mut manager = manager();
        manager.start_undo_session();
        manager.initialize_account(account(1)).unwrap();
        manager
            .set_account_limits(
                account(1),
                ResourceLimit::Limited(10),
                ResourceLimit::Limited(1),
                ResourceLimit::Limited(1),
            )
            .unwrap();
        manager.add_pending_ram_usage(account(1), 5).unwrap();
        manager
            .add_transaction_usage(&BTreeSet::from([account(1)]), 10, 10, 1)
            .unwrap();
        manager.process_block_usage(1).unwrap();
        manager.process_account_limit_updates().unwrap();
        assert_eq!(manager.undo_depth(), 1);

        manager.undo().unwrap();
        assert_eq!(manager.undo_depth(), 0);
        assert!(manager.get_account_usage(&account(1)).is_err());
        assert_eq!(manager.get_total_cpu_weight().unwrap(), 0);
        assert_eq!(manager.state().unwrap(), &ResourceLimitsState::new(manager.config().unwrap()));

        // the pending set must be restored too
        manager.initialize_account(account(1)).unwrap();
        manager.process_account_limit_updates().unwrap();
        assert_eq!(manager.get_total_cpu_weight().unwrap(), 0);
    }

    #[test]
    fn test_set_block_parameters() {
        let mut manager = manager();
        let mut cpu = manager.config().unwrap().cpu_limit_parameters.clone();
        let net = manager.config().unwrap().net_limit_parameters.clone();

        cpu.periods = 0;
        assert!(matches!(
            manager.set_block_parameters(cpu.clone(), net.clone()),
            Err(ChainError::ResourceLimitException(_))
        ));

        cpu.periods = 240;
        cpu.max = 400_000;
        manager.set_block_parameters(cpu, net).unwrap();
        assert_eq!(manager.get_block_cpu_limit().unwrap(), 400_000);
        assert_eq!(manager.config().unwrap().cpu_limit_parameters.periods, 240);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl DeepMindLogger for Recorder {
        fn on_rlimit_op(&self, op: DeepMindOperation, record: RlimitRecord<'_>) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{} {}", record.kind(), op.as_str()));
        }
    }

    #[test]
    fn test_deep_mind_sees_every_record() {
        let recorder = Arc::new(Recorder::default());
        let logger: Arc<dyn DeepMindLogger> = recorder.clone();
        let mut manager = ResourceLimitsManager::new(Some(logger));
        manager.initialize_database(None).unwrap();
        manager.initialize_account(account(1)).unwrap();
        manager
            .set_account_limits(
                account(1),
                ResourceLimit::Unlimited,
                ResourceLimit::Unlimited,
                ResourceLimit::Unlimited,
            )
            .unwrap();
        manager.process_block_usage(1).unwrap();

        let ops = recorder.0.lock().unwrap().clone();
        assert_eq!(
            ops,
            vec![
                "CONFIG INS",
                "STATE INS",
                "ACCOUNT_LIMITS INS",
                "ACCOUNT_USAGE INS",
                "ACCOUNT_LIMITS UPD",
                "STATE UPD",
            ]
        );
    }

    #[test]
    fn test_snapshot_restores_pending_limits() {
        let mut manager = manager();
        manager.initialize_account(account(1)).unwrap();
        manager
            .set_account_limits(
                account(1),
                ResourceLimit::Limited(10),
                ResourceLimit::Limited(1),
                ResourceLimit::Limited(1),
            )
            .unwrap();

        let mut snapshot = JsonSnapshot::new();
        manager.add_to_snapshot(&mut snapshot).unwrap();

        let mut restored = ResourceLimitsManager::default();
        restored.read_from_snapshot(&snapshot).unwrap();
        restored.process_account_limit_updates().unwrap();
        assert_eq!(restored.get_total_cpu_weight().unwrap(), 1);
        assert_eq!(restored.state().unwrap().total_ram_bytes, 10);
    }
}
