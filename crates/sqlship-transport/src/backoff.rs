//! Retry delay policy

use std::time::Duration;

/// Delay after the first failed attempt
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Highest doubling applied to [`BACKOFF_BASE`] (500 ms * 2^6 = 32 s)
pub const BACKOFF_EXPONENT_CAP: u32 = 6;

/// Delay to wait after failed attempt number `attempt` (1-based)
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(BACKOFF_EXPONENT_CAP);
    BACKOFF_BASE * (1u32 << exponent)
}

/// Total sleep of a client that fails all `max_retries` attempts
pub fn total_backoff(max_retries: u32) -> Duration {
    (1..max_retries).map(backoff_delay).sum()
}
