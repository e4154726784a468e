use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::util::lock_unpoisoned;

/// Bounds for the sliding request window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    pub max_requests: usize,
    /// Length of the rolling window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_millis(60_000),
        }
    }
}

/// Sliding-window request limiter.
///
/// Keeps the timestamps of recent requests in arrival order. Every check
/// first drops timestamps at least `window` old, so the retained count is
/// always the usage of the current window.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Returns whether one more request fits in the current window.
    ///
    /// Does not reserve anything; use [`RateLimiter::try_acquire`] when the
    /// check and the reservation must be a single step.
    pub fn can_proceed(&self) -> bool {
        let mut timestamps = lock_unpoisoned(&self.timestamps);
        self.prune(&mut timestamps, Instant::now());
        timestamps.len() < self.config.max_requests
    }

    /// Records one request at the current instant, regardless of capacity.
    pub fn record(&self) {
        lock_unpoisoned(&self.timestamps).push_back(Instant::now());
    }

    /// Checks capacity and records a request under one lock.
    ///
    /// Returns `false` without recording when the window is full.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = lock_unpoisoned(&self.timestamps);
        self.prune(&mut timestamps, now);
        if timestamps.len() >= self.config.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Requests still available in the current window.
    pub fn remaining(&self) -> usize {
        let mut timestamps = lock_unpoisoned(&self.timestamps);
        self.prune(&mut timestamps, Instant::now());
        self.config.max_requests.saturating_sub(timestamps.len())
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) < self.config.window {
                break;
            }
            timestamps.pop_front();
        }
    }
}
