//! Execution agents and clocks
//!
//! The scheduler reaches the remote environment only through
//! `ExecutionAgentClient` and reads time only through `Clock`. `SimulatedAgent`
//! implements the client in-process for the CLI and tests.

mod client;
mod clock;
mod simulated;

pub use client::ExecutionAgentClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use simulated::{SimStats, SimulatedAgent};
