//! Tick loop configuration and bookkeeping
//!
//! Each tick:
//! - reaps batches whose windows have elapsed
//! - asks the coordinator for one cycle per target that is not backing off
//! - records which targets are waiting for capacity

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scheduler::BackoffConfig;

/// Configuration for the scheduling loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Interval between ticks
    #[serde(rename = "tick-interval-ms")]
    pub tick_interval_ms: u64,
    /// Stop after this many ticks (None = run until shut down)
    #[serde(rename = "max-ticks")]
    pub max_ticks: Option<u64>,
    /// In-flight batches allowed per target before the loop waits
    #[serde(rename = "pipeline-depth")]
    pub pipeline_depth: usize,
    pub backoff: BackoffConfig,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            max_ticks: None,
            pipeline_depth: 1,
            backoff: BackoffConfig::default(),
        }
    }
}

impl TickConfig {
    pub fn new(tick_interval_ms: u64, max_ticks: Option<u64>) -> Self {
        Self {
            tick_interval_ms,
            max_ticks,
            ..Self::default()
        }
    }

    pub fn with_pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// What the loop last did for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetStatus {
    /// Nothing requested yet
    Idle,
    /// A batch was dispatched this tick
    Dispatched,
    /// Pipeline full; waiting for in-flight batches to land
    InFlight,
    /// Composer or tracker could not fit a cycle
    WaitingForCapacity,
    /// Recoverable failure; retry after the backoff delay
    BackingOff,
    /// Target needs no work in its mode
    NothingToDo,
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetStatus::Idle => "idle",
            TargetStatus::Dispatched => "dispatched",
            TargetStatus::InFlight => "in-flight",
            TargetStatus::WaitingForCapacity => "waiting for capacity",
            TargetStatus::BackingOff => "backing off",
            TargetStatus::NothingToDo => "nothing to do",
        };
        f.write_str(s)
    }
}

/// Counters and per-target status across ticks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickState {
    /// Number of ticks since start
    pub tick_count: u64,
    /// Batches dispatched this session
    pub total_dispatched: u64,
    /// Batches whose windows elapsed this session
    pub total_elapsed: u64,
    /// Recoverable failures this session
    pub total_misses: u64,
    /// Last status per target
    pub statuses: BTreeMap<String, TargetStatus>,
    /// Whether shutdown has been requested
    pub shutdown_requested: bool,
}

impl TickState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new tick
    pub fn tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn dispatched(&mut self, target: &str) {
        self.total_dispatched += 1;
        self.set_status(target, TargetStatus::Dispatched);
    }

    pub fn elapsed(&mut self, count: usize) {
        self.total_elapsed += count as u64;
    }

    pub fn missed(&mut self, target: &str, status: TargetStatus) {
        self.total_misses += 1;
        self.set_status(target, status);
    }

    pub fn set_status(&mut self, target: &str, status: TargetStatus) {
        self.statuses.insert(target.to_string(), status);
    }

    pub fn status(&self, target: &str) -> TargetStatus {
        self.statuses.get(target).copied().unwrap_or(TargetStatus::Idle)
    }

    /// Targets currently waiting for capacity
    pub fn waiting_for_capacity(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == TargetStatus::WaitingForCapacity)
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Request shutdown
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    /// Whether the loop should stop before starting another tick
    pub fn should_stop(&self, config: &TickConfig) -> bool {
        self.shutdown_requested || config.max_ticks.is_some_and(|max| self.tick_count >= max)
    }
}
