use std::fmt;

use pulsevm_constants::{BLOCK_INTERVAL_MS, BLOCK_TIMESTAMP_EPOCH_MS};
use pulsevm_error::ChainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use time::{Duration, OffsetDateTime, PrimitiveDateTime, macros::format_description};

/// A block production slot: the number of 500ms intervals since 2000-01-01.
/// This is the clock every usage accumulator decays against.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct BlockTimestamp {
    pub slot: u32,
}

impl BlockTimestamp {
    #[inline]
    pub const fn new(slot: u32) -> Self {
        Self { slot }
    }

    #[inline]
    pub fn now() -> Self {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let delta = (now_ms - BLOCK_TIMESTAMP_EPOCH_MS as i128).max(0);
        let slot = delta / BLOCK_INTERVAL_MS as i128;
        Self {
            slot: u32::try_from(slot).unwrap_or(u32::MAX),
        }
    }

    #[inline]
    pub fn next(self) -> Result<Self, ChainError> {
        let slot = self
            .slot
            .checked_add(1)
            .ok_or_else(|| ChainError::InvalidArgument("block timestamp overflow".into()))?;
        Ok(Self { slot })
    }

    fn to_offset_date_time(self) -> OffsetDateTime {
        let total_ms =
            self.slot as i64 * BLOCK_INTERVAL_MS as i64 + BLOCK_TIMESTAMP_EPOCH_MS;
        OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(total_ms)
    }

    /// `YYYY-MM-DDTHH:MM:SS.sss`, no zone suffix.
    pub fn to_time_string(&self) -> String {
        let format =
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");
        self.to_offset_date_time()
            .format(&format)
            .unwrap_or_default()
    }

    pub fn parse(s: &str) -> Result<Self, ChainError> {
        let format =
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");
        let dt = PrimitiveDateTime::parse(s.trim_end_matches('Z'), &format)
            .map_err(|e| ChainError::ParseError(format!("invalid block timestamp '{}': {}", s, e)))?
            .assume_utc();
        let ms = dt.unix_timestamp_nanos() / 1_000_000 - BLOCK_TIMESTAMP_EPOCH_MS as i128;
        if ms < 0 || ms % BLOCK_INTERVAL_MS as i128 != 0 {
            return Err(ChainError::ParseError(format!(
                "block timestamp '{}' is not aligned to a block slot",
                s
            )));
        }
        let slot = u32::try_from(ms / BLOCK_INTERVAL_MS as i128)
            .map_err(|_| ChainError::ParseError(format!("block timestamp '{}' out of range", s)))?;
        Ok(Self { slot })
    }
}

impl From<u32> for BlockTimestamp {
    fn from(slot: u32) -> Self {
        Self { slot }
    }
}

impl fmt::Display for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_time_string())
    }
}

impl Serialize for BlockTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_time_string())
    }
}

impl<'de> Deserialize<'de> for BlockTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockTimestamp::parse(&s).map_err(de::Error::custom)
    }
}
