//! In-flight batch tracking against agent capacity.

use std::collections::HashMap;

use crate::domain::{BatchInfo, BatchStatus};
use crate::error::{BatchrError, Result};

/// Records in-flight batches per execution agent.
///
/// Remote legs never report completion, so absolute time is the source of truth:
/// a batch holds its threads until `now >= window.end`, and every query ignores
/// records whose window has elapsed.
#[derive(Debug, Default)]
pub struct DispatchTracker {
    /// Total thread capacity per agent
    capacities: HashMap<String, u32>,
    /// Reserved batches keyed by batch id
    batches: HashMap<String, BatchInfo>,
}

impl DispatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update an agent's total thread capacity
    pub fn set_capacity(&mut self, agent: &str, threads: u32) {
        self.capacities.insert(agent.to_string(), threads);
    }

    pub fn capacity(&self, agent: &str) -> Option<u32> {
        self.capacities.get(agent).copied()
    }

    /// Registered agents
    pub fn agents(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = self.capacities.keys().map(String::as_str).collect();
        agents.sort_unstable();
        agents
    }

    /// Threads committed on `agent` by batches whose window has not elapsed
    pub fn current_load(&self, agent: &str, now_ms: u64) -> u32 {
        self.batches
            .values()
            .filter(|b| b.assignee == agent && !b.is_elapsed(now_ms))
            .map(BatchInfo::threads)
            .sum()
    }

    /// Capacity minus committed load
    pub fn available(&self, agent: &str, now_ms: u64) -> Result<u32> {
        let capacity = self
            .capacity(agent)
            .ok_or_else(|| BatchrError::UnknownAgent(agent.to_string()))?;
        Ok(capacity.saturating_sub(self.current_load(agent, now_ms)))
    }

    /// Commit a scheduled batch's threads to its agent.
    ///
    /// Fails without touching any state if the batch would push the agent past
    /// its capacity.
    pub fn reserve(&mut self, batch: BatchInfo, now_ms: u64) -> Result<BatchInfo> {
        let available = self.available(&batch.assignee, now_ms)?;
        let needed = batch.threads();
        if needed > available {
            return Err(BatchrError::InsufficientCapacity { needed, available });
        }
        if self.batches.contains_key(&batch.id) {
            return Err(BatchrError::InvalidState(format!("batch {} already reserved", batch.id)));
        }

        self.purge(now_ms);
        log::debug!(
            "Reserved {} threads on {} for {} until {}",
            needed,
            batch.assignee,
            batch.id,
            batch.window.end_ms
        );
        self.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    /// Drop a batch and return its threads to the agent immediately
    pub fn release(&mut self, batch_id: &str) -> Option<BatchInfo> {
        self.batches.remove(batch_id)
    }

    /// Release a batch whose launch failed
    pub fn abandon(&mut self, batch_id: &str) -> Option<BatchInfo> {
        let mut batch = self.batches.remove(batch_id)?;
        if let Err(e) = batch.transition(BatchStatus::Abandoned) {
            log::warn!("{}", e);
        }
        Some(batch)
    }

    /// Abandon a batch some of whose legs already launched.
    ///
    /// The launched legs keep running, so the record keeps its threads until the
    /// window elapses like any other in-flight batch.
    pub fn abandon_launched(&mut self, batch_id: &str, pids: Vec<u64>) -> Result<&BatchInfo> {
        let batch = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchrError::InvalidState(format!("batch {} is not reserved", batch_id)))?;
        batch.transition(BatchStatus::Abandoned)?;
        batch.pids = pids;
        Ok(batch)
    }

    /// Record launched process ids and move the batch to `Dispatched`
    pub fn mark_dispatched(&mut self, batch_id: &str, pids: Vec<u64>) -> Result<&BatchInfo> {
        let batch = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchrError::InvalidState(format!("batch {} is not reserved", batch_id)))?;
        batch.transition(BatchStatus::Dispatched)?;
        batch.pids = pids;
        Ok(batch)
    }

    /// Flag one batch as best-effort
    pub fn mark_stale(&mut self, batch_id: &str) -> Result<()> {
        let batch = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchrError::InvalidState(format!("batch {} is not reserved", batch_id)))?;
        batch.stale = true;
        Ok(())
    }

    pub fn get(&self, batch_id: &str) -> Option<&BatchInfo> {
        self.batches.get(batch_id)
    }

    /// Drop every record whose window has elapsed, returning them
    pub fn purge(&mut self, now_ms: u64) -> Vec<BatchInfo> {
        let elapsed: Vec<String> = self
            .batches
            .values()
            .filter(|b| b.is_elapsed(now_ms))
            .map(|b| b.id.clone())
            .collect();

        elapsed
            .into_iter()
            .filter_map(|id| self.batches.remove(&id))
            .map(|mut batch| {
                if batch.status == BatchStatus::Dispatched {
                    batch.status = BatchStatus::Elapsed;
                }
                batch
            })
            .collect()
    }

    /// Batches against `target` still in flight, earliest window first
    pub fn in_flight(&self, target: &str, now_ms: u64) -> Vec<&BatchInfo> {
        let mut batches: Vec<&BatchInfo> = self
            .batches
            .values()
            .filter(|b| b.target == target && !b.is_elapsed(now_ms))
            .collect();
        batches.sort_by_key(|b| (b.window.start_ms, b.window.end_ms));
        batches
    }

    /// Flag batches composed at a different player level; returns newly stale ones
    pub fn refresh_staleness(&mut self, current_level: u32) -> Vec<BatchInfo> {
        self.batches
            .values_mut()
            .filter(|b| !b.stale)
            .filter_map(|b| b.check_staleness(current_level).then(|| b.clone()))
            .collect()
    }

    /// Number of records held, elapsed or not
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
