use anyhow::{ensure, Result};
use rand::Rng;
use std::time::Duration;

/// Fixed wait between two dispatches of one worker running at `rate` req/s.
/// Truncates to whole nanoseconds.
#[inline]
pub fn time_to_wait(rate: u64) -> Result<Duration> {
    ensure!(rate >= 1, "rate must be at least 1 req/s, got {rate}");
    Ok(Duration::from_nanos(1_000_000_000 / rate))
}

/// Whether this request's body gets hashed. `sample_rate` <= 0 never checks,
/// >= 1 always does.
#[inline]
pub fn should_check_hash<R: Rng + ?Sized>(rng: &mut R, sample_rate: f64) -> bool {
    rng.gen::<f64>() < sample_rate
}
