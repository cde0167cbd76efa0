mod usage_accumulator;
pub use usage_accumulator::*;

#[inline]
pub fn pulse_assert<T>(condition: bool, error: T) -> Result<(), T> {
    if condition { Ok(()) } else { Err(error) }
}
