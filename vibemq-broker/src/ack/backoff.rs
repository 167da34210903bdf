//! Exponential retry backoff for the ack tracker (§4.8).
//!
//! The formula is the teacher's `RestartBackoff::calculate_delay`
//! (`base * 2^min(count, 10)`, capped at `max`), reused for message
//! redelivery instead of actor restarts.

use std::time::Duration;

/// Default base retry delay (§4.8).
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Default maximum retry delay (§4.8).
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

/// Compute `min(max_delay, base_delay * 2^(attempts - 1))` for `attempts >= 1`.
/// `attempts == 0` returns `base_delay` unscaled, matching the first retry.
pub fn retry_delay(attempts: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(10);
    let scaled = base_delay.saturating_mul(1u32 << exponent);
    scaled.min(max_delay)
}
