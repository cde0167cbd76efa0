use std::ops::{Add, Div, Mul, Rem};

use pulsevm_constants::RATE_LIMITING_PRECISION;
use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize};

use crate::chain::utils::pulse_assert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ratio<T> {
    pub numerator: T,
    pub denominator: T,
}

pub fn make_ratio<T>(n: T, d: T) -> Ratio<T> {
    Ratio {
        numerator: n,
        denominator: d,
    }
}

impl Mul<Ratio<u64>> for u128 {
    type Output = Result<u128, ChainError>;

    /// Truncates the quotient toward zero.
    fn mul(self, r: Ratio<u64>) -> Self::Output {
        pulse_assert(
            r.denominator > 0,
            ChainError::InvalidArgument("ratio with zero denominator".to_string()),
        )?;
        let product = self.checked_mul(r.numerator as u128).ok_or_else(|| {
            ChainError::InvalidArgument("overflow when multiplying by ratio".to_string())
        })?;
        Ok(product / r.denominator as u128)
    }
}

impl Mul<Ratio<u64>> for u64 {
    type Output = Result<u64, ChainError>;

    /// Multiplies in 128 bits and truncates the quotient toward zero.
    fn mul(self, r: Ratio<u64>) -> Self::Output {
        let product = (self as u128 * r)?;
        u64::try_from(product).map_err(|_| {
            ChainError::InvalidArgument("product does not fit into 64 bits".to_string())
        })
    }
}

/// Windowed moving sum of per-slot usage.
///
/// `value_ex` holds the usage attributed to the current window, multiplied by
/// [`RATE_LIMITING_PRECISION`]. Samples are added undivided so billing is
/// exact; only reads divide. When the ordinal advances by `delta` slots the
/// previous value is scaled by `(window - delta) / window`, so a full window
/// without activity clears it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageAccumulator {
    pub last_ordinal: u32,
    #[serde(with = "u128_string")]
    pub value_ex: u128,
}

impl UsageAccumulator {
    /// The per-slot average over `window_size` slots in real units, rounded
    /// up.
    pub fn average(&self, window_size: u64) -> Result<u64, ChainError> {
        pulse_assert(
            window_size > 0,
            ChainError::InvalidArgument("usage window cannot be zero".to_string()),
        )?;
        let average = integer_divide_ceil(
            self.value_ex,
            RATE_LIMITING_PRECISION as u128 * window_size as u128,
        );
        u64::try_from(average).map_err(|_| {
            ChainError::InvalidArgument("average usage does not fit into 64 bits".to_string())
        })
    }

    /// Total usage attributed to the window, rounded up.
    pub fn value_in_window(&self) -> u128 {
        integer_divide_ceil(self.value_ex, RATE_LIMITING_PRECISION as u128)
    }

    pub fn add(&mut self, units: u64, ordinal: u32, window_size: u64) -> Result<(), ChainError> {
        pulse_assert(
            window_size > 0,
            ChainError::InvalidArgument("usage window cannot be zero".to_string()),
        )?;

        let mut value_ex = self.value_ex;
        if self.last_ordinal != ordinal {
            pulse_assert(
                ordinal > self.last_ordinal,
                ChainError::InvalidArgument(
                    "new ordinal cannot be less than the previous ordinal".to_string(),
                ),
            )?;

            let delta = (ordinal - self.last_ordinal) as u64;
            value_ex = if delta < window_size {
                (value_ex * make_ratio(window_size - delta, window_size))?
            } else {
                0
            };
        }

        let value_ex = value_ex
            .checked_add(units as u128 * RATE_LIMITING_PRECISION as u128)
            .ok_or_else(|| {
                ChainError::TransactionError(
                    "overflow in accumulated value when adding usage".to_string(),
                )
            })?;

        self.value_ex = value_ex;
        self.last_ordinal = ordinal;
        Ok(())
    }
}

/// JSON numbers cannot carry the full `u128` range, so the value travels as a
/// decimal string.
mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

pub fn integer_divide_ceil<T>(num: T, den: T) -> T
where
    T: Copy + PartialOrd + Div<Output = T> + Rem<Output = T> + Add<Output = T> + From<u8>,
{
    let div = num / den;
    let rem = num % den;
    if rem > T::from(0) {
        div + T::from(1)
    } else {
        div
    }
}
