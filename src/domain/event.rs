//! Scheduler event records handed to the injected event sink.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{generate_event_id, now_ms};

/// Event type constants
pub mod event_types {
    pub const BATCH_SCHEDULED: &str = "batch.scheduled";
    pub const BATCH_DISPATCHED: &str = "batch.dispatched";
    pub const BATCH_ABANDONED: &str = "batch.abandoned";
    pub const BATCH_ELAPSED: &str = "batch.elapsed";
    pub const BATCH_STALE: &str = "batch.stale";
    pub const CAPACITY_WAITING: &str = "capacity.waiting";
    pub const DEADLINE_MISSED: &str = "deadline.missed";
    pub const LOOP_STARTED: &str = "loop.started";
    pub const LOOP_STOPPED: &str = "loop.stopped";
}

/// General-purpose scheduler event for observability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    /// Unique event identifier
    pub id: String,
    /// Event type (e.g., "batch.dispatched", "capacity.waiting")
    pub event_type: String,
    /// Target hostname (if any)
    pub target: Option<String>,
    /// Associated batch ID (if any)
    pub batch_id: Option<String>,
    /// Event-specific payload data
    pub payload: Value,
    /// Unix timestamp in milliseconds
    pub created_at: u64,
}

impl EventRecord {
    /// Create a new event with the given type and payload
    pub fn new(event_type: &str, target: Option<&str>, batch_id: Option<&str>, payload: Value) -> Self {
        Self {
            id: generate_event_id(),
            event_type: event_type.to_string(),
            target: target.map(str::to_string),
            batch_id: batch_id.map(str::to_string),
            payload,
            created_at: now_ms(),
        }
    }

    pub fn batch_scheduled(target: &str, batch_id: &str, cycle_type: &str, threads: u32) -> Self {
        Self::new(
            event_types::BATCH_SCHEDULED,
            Some(target),
            Some(batch_id),
            serde_json::json!({ "cycle_type": cycle_type, "threads": threads }),
        )
    }

    pub fn batch_dispatched(target: &str, batch_id: &str, agent: &str, pids: &[u64]) -> Self {
        Self::new(
            event_types::BATCH_DISPATCHED,
            Some(target),
            Some(batch_id),
            serde_json::json!({ "agent": agent, "pids": pids }),
        )
    }

    pub fn batch_abandoned(target: &str, batch_id: &str, reason: &str) -> Self {
        Self::new(
            event_types::BATCH_ABANDONED,
            Some(target),
            Some(batch_id),
            serde_json::json!({ "reason": reason }),
        )
    }

    pub fn batch_elapsed(target: &str, batch_id: &str) -> Self {
        Self::new(event_types::BATCH_ELAPSED, Some(target), Some(batch_id), Value::Null)
    }

    /// Player level moved while the batch was in flight; durations are best-effort
    pub fn batch_stale(target: &str, batch_id: &str, composed_level: u32, current_level: u32) -> Self {
        Self::new(
            event_types::BATCH_STALE,
            Some(target),
            Some(batch_id),
            serde_json::json!({
                "composed_level": composed_level,
                "current_level": current_level
            }),
        )
    }

    pub fn capacity_waiting(target: &str, agent: &str, reason: &str) -> Self {
        Self::new(
            event_types::CAPACITY_WAITING,
            Some(target),
            None,
            serde_json::json!({ "agent": agent, "reason": reason }),
        )
    }

    pub fn deadline_missed(target: &str, reason: &str) -> Self {
        Self::new(
            event_types::DEADLINE_MISSED,
            Some(target),
            None,
            serde_json::json!({ "reason": reason }),
        )
    }

    pub fn loop_started(targets: &[String]) -> Self {
        Self::new(
            event_types::LOOP_STARTED,
            None,
            None,
            serde_json::json!({ "targets": targets }),
        )
    }

    pub fn loop_stopped(ticks: u64) -> Self {
        Self::new(event_types::LOOP_STOPPED, None, None, serde_json::json!({ "ticks": ticks }))
    }

    /// Check if this is a batch-related event
    pub fn is_batch_event(&self) -> bool {
        self.batch_id.is_some()
    }
}
