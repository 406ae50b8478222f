//! Batch scheduler: landing-order timing and retry backoff.
//!
//! This module provides:
//! - **Timing**: back-computes absolute start times from a completion anchor so
//!   legs land in order `Hack -> Weaken -> Grow -> Weaken`, each at least one
//!   safety gap apart.
//! - **Pipelining**: `TimingPlanner` keeps successive cycles against the same
//!   target from interleaving their landing windows.
//! - **Backoff**: exponential waits when capacity or deadlines keep failing.
//!
//! # Example
//!
//! ```ignore
//! use batchr::scheduler::{TimingConfig, TimingPlanner};
//!
//! let mut planner = TimingPlanner::new(TimingConfig::default());
//! let duration = planner.cycle_duration_ms(&cycle);
//! let scheduled = planner.schedule("n00dles", cycle, duration, clock.now_ms())?;
//! ```

mod backoff;
mod timing;

pub use backoff::{Backoff, BackoffConfig};
pub use timing::{
    TimingConfig, TimingPlanner, landing_span_ms, min_cycle_duration_ms, schedule_at_anchor, schedule_cycle,
};
