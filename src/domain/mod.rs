//! Domain types for batchr
//!
//! This module contains all core domain types:
//! - OpKind: The four remote operations (weaken, grow, hack, share)
//! - TargetState / PlayerState: Snapshots consumed by the calculator and composer
//! - Cycle / CycleInfo: One coordinated set of legs and their timing
//! - BatchInfo: A dispatched cycle owned by the dispatch tracker
//! - HackMode: Strategy gating which cycle variant gets composed
//! - EventRecord: Scheduler events handed to the injected event sink

pub mod batch;
pub mod cycle;
pub mod event;
pub mod mode;
pub mod op;
pub mod target;

pub use batch::{BatchInfo, BatchStatus, Window};
pub use cycle::{Cycle, CycleInfo, CycleType};
pub use event::{EventRecord, event_types};
pub use mode::{HackMode, StockBias};
pub use op::OpKind;
pub use target::{Multipliers, PlayerState, TargetState};
