//! Daemon core - the cooperative scheduling loop
//!
//! The daemon is the long-running side of batchr:
//! - Ticks at a fixed interval through the injected clock
//! - Feeds each configured target one cycle at a time
//! - Backs off per target when capacity or deadlines keep failing

pub mod runner;
pub mod tick;

pub use runner::*;
pub use tick::*;
