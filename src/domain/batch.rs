//! Batch records
//!
//! A `BatchInfo` is one dispatched instance of a cycle. It is owned by the dispatch
//! tracker from reservation until its reserved window elapses.

use serde::{Deserialize, Serialize};

use super::cycle::{Cycle, CycleType};
use crate::error::{BatchrError, Result};
use crate::id::generate_batch_id;

/// Lifecycle of a batch record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Thread counts fixed, no times yet
    Composed,
    /// Start/end times assigned, not yet sent to an agent
    Scheduled,
    /// Launch requests issued, process ids recorded
    Dispatched,
    /// Window passed, capacity reclaimed
    Elapsed,
    /// Launch failed; capacity released early unless some legs already launched
    Abandoned,
}

impl BatchStatus {
    /// Returns true if the batch will not progress any further
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Elapsed | BatchStatus::Abandoned)
    }

    /// Forward-only transitions
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Composed, BatchStatus::Scheduled)
                | (BatchStatus::Scheduled, BatchStatus::Dispatched)
                | (BatchStatus::Scheduled, BatchStatus::Abandoned)
                | (BatchStatus::Dispatched, BatchStatus::Elapsed)
                | (BatchStatus::Dispatched, BatchStatus::Abandoned)
        )
    }
}

/// Reserved time window `[start_ms, end_ms)` on the monotonic clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Window {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    /// A window has elapsed once `now >= end`
    pub fn has_elapsed(&self, now_ms: u64) -> bool {
        now_ms >= self.end_ms
    }

    pub fn len_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// One dispatched cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInfo {
    /// Unique batch identifier
    pub id: String,
    /// Correlates cycles fed into the same target pipeline
    pub event_id: String,
    /// Process ids of launched legs, in landing order
    pub pids: Vec<u64>,
    /// Execution agent hostname
    pub assignee: String,
    /// Target hostname
    pub target: String,
    pub cycle_type: CycleType,
    /// Player hacking level the durations were computed with
    pub player_level: u32,
    pub window: Window,
    pub cycle: Cycle,
    pub status: BatchStatus,
    /// Set when the player's level changed while this batch was in flight
    pub stale: bool,
}

impl BatchInfo {
    /// Wrap a scheduled cycle in a batch record
    pub fn new(target: &str, assignee: &str, event_id: &str, player_level: u32, cycle: Cycle) -> Self {
        let window = Window::new(cycle.first_start_ms(), cycle.last_completion_ms());
        Self {
            id: generate_batch_id(target),
            event_id: event_id.to_string(),
            pids: Vec::new(),
            assignee: assignee.to_string(),
            target: target.to_string(),
            cycle_type: cycle.cycle_type(),
            player_level,
            window,
            cycle,
            status: BatchStatus::Scheduled,
            stale: false,
        }
    }

    /// Total threads the batch holds on its agent
    pub fn threads(&self) -> u32 {
        self.cycle.total_threads()
    }

    /// Move to the next lifecycle state
    pub fn transition(&mut self, next: BatchStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BatchrError::InvalidState(format!(
                "batch {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Returns true if the reserved window has passed
    pub fn is_elapsed(&self, now_ms: u64) -> bool {
        self.window.has_elapsed(now_ms)
    }

    /// Flag the batch as best-effort if the player's level moved since composition
    pub fn check_staleness(&mut self, current_level: u32) -> bool {
        if current_level != self.player_level {
            self.stale = true;
        }
        self.stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CycleInfo, OpKind};

    fn make_batch() -> BatchInfo {
        let mut w = CycleInfo::new(OpKind::Weaken, 4, 4000, -0.2);
        w.start_ms = 1_000;
        BatchInfo::new("n00dles", "home", "evt-1", 50, Cycle::Weaken { w })
    }

    #[test]
    fn test_new_batch_window() {
        let batch = make_batch();
        assert_eq!(batch.window, Window::new(1_000, 5_000));
        assert_eq!(batch.status, BatchStatus::Scheduled);
        assert_eq!(batch.cycle_type, CycleType::Weaken);
        assert_eq!(batch.threads(), 4);
    }

    #[test]
    fn test_window_elapsed_boundary() {
        let window = Window::new(100, 200);
        assert!(!window.has_elapsed(199));
        assert!(window.has_elapsed(200));
        assert_eq!(window.len_ms(), 100);
    }

    #[test]
    fn test_forward_transitions() {
        let mut batch = make_batch();
        batch.transition(BatchStatus::Dispatched).unwrap();
        batch.transition(BatchStatus::Elapsed).unwrap();
        assert!(batch.status.is_terminal());
    }

    #[test]
    fn test_no_backward_transition() {
        let mut batch = make_batch();
        batch.transition(BatchStatus::Dispatched).unwrap();
        let err = batch.transition(BatchStatus::Scheduled).unwrap_err();
        assert!(matches!(err, BatchrError::InvalidState(_)));
        assert_eq!(batch.status, BatchStatus::Dispatched);
    }

    #[test]
    fn test_abandon_from_scheduled() {
        let mut batch = make_batch();
        batch.transition(BatchStatus::Abandoned).unwrap();
        assert!(batch.status.is_terminal());
    }

    #[test]
    fn test_check_staleness() {
        let mut batch = make_batch();
        assert!(!batch.check_staleness(50));
        assert!(batch.check_staleness(51));
        // stays stale once flagged
        assert!(batch.check_staleness(50));
    }
}
