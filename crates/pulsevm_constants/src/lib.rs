pub const BLOCK_INTERVAL_MS: u32 = 500;
pub const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000; // 2000-01-01T00:00:00Z

pub const PERCENT_100: u64 = 10000; // basis points, 10000 = 100%
pub const PERCENT_1: u64 = 100;

pub const RATE_LIMITING_PRECISION: u64 = 1000 * 1000;

pub const ACCOUNT_CPU_USAGE_AVERAGE_WINDOW_MS: u32 = 24 * 60 * 60 * 1000;
pub const ACCOUNT_NET_USAGE_AVERAGE_WINDOW_MS: u32 = 24 * 60 * 60 * 1000;
pub const BLOCK_CPU_USAGE_AVERAGE_WINDOW_MS: u32 = 60 * 1000;
pub const BLOCK_SIZE_AVERAGE_WINDOW_MS: u32 = 60 * 1000;
pub const MAXIMUM_ELASTIC_RESOURCE_MULTIPLIER: u32 = 1000;

pub const DEFAULT_MAX_BLOCK_NET_USAGE: u32 = 1024 * 1024; // ~10,000 TPS burst at 200 byte trx
pub const DEFAULT_TARGET_BLOCK_NET_USAGE_PCT: u32 = 10 * PERCENT_1 as u32;

pub const DEFAULT_MAX_BLOCK_CPU_USAGE: u32 = 200_000; // microseconds
pub const DEFAULT_TARGET_BLOCK_CPU_USAGE_PCT: u32 = 10 * PERCENT_1 as u32;

pub const DEFAULT_ELASTIC_CONTRACT_RATE: (u64, u64) = (99, 100);
pub const DEFAULT_ELASTIC_EXPAND_RATE: (u64, u64) = (1000, 999);

/// `value * percentage / PERCENT_100`, rounded down.
pub const fn eos_percent(value: u64, percentage: u32) -> u64 {
    (value * percentage as u64) / PERCENT_100
}
