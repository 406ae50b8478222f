//! Batch composer: thread counts per cycle leg.
//!
//! Given a fresh target snapshot, the player state, the hack mode and the threads
//! an agent can spare, the composer picks a cycle variant and sizes each leg:
//!
//! - **Weaken**: pull security back to the floor (partial if capacity is short).
//! - **Grow**: restore money to max, with a weaken that cancels grow's security.
//! - **Hack**: take a configured fraction of money, cancel hack's security, grow
//!   the money back, cancel grow's security.
//!
//! Weaken legs are always sized by ceiling division so security is never left
//! under-corrected. When a cycle does not fit, the hack (or grow) leg is scaled
//! down and every dependent leg recomputed.

mod compose;

pub use compose::{Composer, ComposerConfig};
