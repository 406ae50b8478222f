//! batchr - a hack/grow/weaken batch scheduler
//!
//! batchr composes cycles of remote operations against a target, times them so
//! they land in a fixed order a safety gap apart, and tracks in-flight batches
//! against execution agent capacity.

pub mod agent;
pub mod composer;
pub mod coordinator;
pub mod daemon;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod formulas;
pub mod id;
pub mod scheduler;
pub mod sink;
pub mod storage;

pub use error::{BatchrError, Result};
