//! Batch coordinator
//!
//! Exposes `request_cycle(target, mode, agent)`, the one entry point that takes a
//! fresh snapshot through composition, timing, capacity reservation and launch.

mod coordinate;

pub use coordinate::BatchCoordinator;
