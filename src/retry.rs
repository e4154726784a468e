use std::time::Duration;

/// Exponential backoff configuration.
///
/// Attempt `n` (0-indexed) waits `min(base_delay * backoff_multiplier^n, max_delay)`
/// before attempt `n + 1`. No jitter is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Configuration that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns the backoff delay that follows the given failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        delay_for(attempt, self)
    }
}

/// Computes `min(base_delay * backoff_multiplier^attempt, max_delay)`.
///
/// Non-finite or negative intermediate values collapse to `max_delay`
/// and zero respectively, so the sequence stays non-decreasing for any
/// multiplier `>= 1`.
pub fn delay_for(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let factor = config.backoff_multiplier.powi(exponent);
    let nanos = config.base_delay.as_nanos() as f64 * factor;
    let cap = config.max_delay.as_nanos() as f64;

    if !nanos.is_finite() || nanos >= cap {
        return config.max_delay;
    }
    if nanos <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(nanos.round() as u64)
}
