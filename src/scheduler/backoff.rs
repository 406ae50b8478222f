//! Backoff state for the scheduling loop.
//!
//! Repeated `InsufficientCapacity` / `PastDeadline` results must not turn into a
//! retry storm. Each miss doubles the wait (capped); a success clears it.

use serde::{Deserialize, Serialize};

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Wait after the first miss (milliseconds).
    #[serde(rename = "initial-ms")]
    pub initial_ms: u64,
    /// Maximum wait (milliseconds).
    #[serde(rename = "max-ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 200,
            max_ms: 10_000,
        }
    }
}

impl BackoffConfig {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self { initial_ms, max_ms }
    }
}

/// Backoff state for one target, on the scheduler's monotonic clock.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    /// Clock time before which no attempt is made (None = no active backoff).
    pub retry_at_ms: Option<u64>,
    /// Number of consecutive misses.
    pub consecutive_misses: u32,
    /// Clock time of the last successful dispatch.
    pub last_success_ms: Option<u64>,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            retry_at_ms: None,
            consecutive_misses: 0,
            last_success_ms: None,
        }
    }

    /// Check if we are still backing off at `now_ms`.
    pub fn is_backing_off(&self, now_ms: u64) -> bool {
        self.retry_at_ms.is_some_and(|until| now_ms < until)
    }

    /// Remaining wait at `now_ms`, if any.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.retry_at_ms.filter(|&until| now_ms < until).map(|until| until - now_ms)
    }

    /// Delay for the current miss count: `initial * 2^(misses-1)`, capped at max.
    pub fn current_delay_ms(&self) -> u64 {
        if self.consecutive_misses == 0 {
            return 0;
        }
        let exp = (self.consecutive_misses - 1).min(16);
        self.config.initial_ms.saturating_mul(1u64 << exp).min(self.config.max_ms)
    }

    /// Record a recoverable miss at `now_ms` and return the wait until the next attempt.
    ///
    /// `hint_ms` lets the caller ask for at least a specific wait (one cycle
    /// duration after `PastDeadline`). The hint is not capped by `max_ms`.
    pub fn record_miss(&mut self, now_ms: u64, hint_ms: Option<u64>) -> u64 {
        self.consecutive_misses += 1;
        let delay_ms = hint_ms.map_or(self.current_delay_ms(), |h| h.max(self.current_delay_ms()));
        self.retry_at_ms = Some(now_ms + delay_ms);

        tracing::warn!(
            backoff_ms = delay_ms,
            consecutive_misses = self.consecutive_misses,
            "Backing off"
        );
        delay_ms
    }

    /// Record a successful dispatch at `now_ms`.
    pub fn record_success(&mut self, now_ms: u64) {
        self.consecutive_misses = 0;
        self.retry_at_ms = None;
        self.last_success_ms = Some(now_ms);
    }

    /// Time since the last success, if there was one.
    pub fn since_success_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_success_ms.map(|t| now_ms.saturating_sub(t))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
