//! Dispatch tracking
//!
//! - `DispatchTracker`: per-agent committed load, capacity checks, lazy purge
//! - `within_drift`: the agent-side start-time check that stands in for cancellation

mod drift;
mod tracker;

pub use drift::within_drift;
pub use tracker::DispatchTracker;
