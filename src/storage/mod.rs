//! Snapshot storage
//!
//! The scheduler core never reads or writes files. Snapshots go through the
//! `SnapshotStore` seam: `MemorySnapshotStore` for tests and one-shot runs,
//! `JsonlSnapshotStore` when the caller wants them on disk.

mod jsonl;
mod traits;

pub use jsonl::JsonlSnapshotStore;
pub use traits::{MemorySnapshotStore, SnapshotStore};
