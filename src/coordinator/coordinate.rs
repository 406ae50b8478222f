//! `request_cycle`: one snapshot, one composed cycle, one dispatched batch.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::{Clock, ExecutionAgentClient};
use crate::composer::{Composer, ComposerConfig};
use crate::dispatch::DispatchTracker;
use crate::domain::{BatchInfo, EventRecord, HackMode, Multipliers, PlayerState, TargetState};
use crate::error::{BatchrError, Result};
use crate::id::generate_event_id;
use crate::scheduler::{TimingConfig, TimingPlanner};
use crate::sink::EventSink;
use crate::storage::SnapshotStore;

/// Owns the composer, timing planner and dispatch tracker for every target.
///
/// All mutation happens through `&mut self`, so a single scheduling loop drives it.
pub struct BatchCoordinator {
    client: Arc<dyn ExecutionAgentClient>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    snapshots: Option<Arc<dyn SnapshotStore<TargetState>>>,
    composer: Composer,
    planner: TimingPlanner,
    tracker: DispatchTracker,
    multipliers: Multipliers,
    /// Core count per registered agent
    cores: HashMap<String, u32>,
    /// Pipeline correlation id per target
    event_ids: HashMap<String, String>,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("tracker", &self.tracker)
            .field("cores", &self.cores)
            .finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    pub fn new(
        client: Arc<dyn ExecutionAgentClient>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        composer: ComposerConfig,
        timing: TimingConfig,
    ) -> Self {
        Self {
            client,
            clock,
            sink,
            snapshots: None,
            composer: Composer::new(composer),
            planner: TimingPlanner::new(timing),
            tracker: DispatchTracker::new(),
            multipliers: Multipliers::default(),
            cores: HashMap::new(),
            event_ids: HashMap::new(),
        }
    }

    pub fn with_multipliers(mut self, multipliers: Multipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    /// Keep every fetched target snapshot in `store`
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore<TargetState>>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Register an execution agent's capacity
    pub fn register_agent(&mut self, hostname: &str, threads: u32, cores: u32) {
        self.tracker.set_capacity(hostname, threads);
        self.cores.insert(hostname.to_string(), cores.max(1));
    }

    pub fn tracker(&self) -> &DispatchTracker {
        &self.tracker
    }

    pub fn planner(&self) -> &TimingPlanner {
        &self.planner
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Compose, schedule, reserve and launch one cycle against `target` on `agent`.
    ///
    /// Errors: `InsufficientCapacity` and `PastDeadline` mean "wait and retry";
    /// `DispatchFailure` means the batch was abandoned. Its threads and landing
    /// slot are released only if no leg had launched yet; otherwise both stay held
    /// until the window ends.
    pub async fn request_cycle(&mut self, target: &str, mode: HackMode, agent: &str) -> Result<BatchInfo> {
        let cores = *self
            .cores
            .get(agent)
            .ok_or_else(|| BatchrError::UnknownAgent(agent.to_string()))?;

        let now = self.clock.now_ms();
        self.reap(now);

        let snapshot = self.client.target_state(target).await?;
        if let Some(store) = &self.snapshots {
            store.put(target, &snapshot)?;
        }
        let skill = self.client.player_skill().await?;
        self.refresh_staleness(skill);
        let player = PlayerState::new(skill).with_multipliers(self.multipliers.clone());

        let now = self.clock.now_ms();
        let remote_free = self.client.available_threads(agent).await?;
        let available = self.tracker.available(agent, now)?.min(remote_free);

        let cycle = match self.composer.compose_cycle(mode, &snapshot, &player, available, cores) {
            Ok(cycle) => cycle,
            Err(e) => {
                if e.is_capacity_wait() {
                    self.sink
                        .record(EventRecord::capacity_waiting(target, agent, &e.to_string()));
                }
                return Err(e);
            }
        };

        let now = self.clock.now_ms();
        let previous_end = self.planner.landing_end(target);
        let duration = self.planner.cycle_duration_ms(&cycle);
        let scheduled = match self.planner.schedule(target, cycle, duration, now) {
            Ok(cycle) => cycle,
            Err(e) => {
                self.sink.record(EventRecord::deadline_missed(target, &e.to_string()));
                return Err(e);
            }
        };
        let scheduled_end = scheduled.last_completion_ms();

        // Durations were computed at `skill`; a level-up since then invalidates them
        let skill_now = self.client.player_skill().await?;
        if skill_now != skill {
            self.planner.rewind(target, scheduled_end, previous_end);
            return Err(BatchrError::StaleState(format!(
                "player skill moved from {} to {} while composing for {}",
                skill, skill_now, target
            )));
        }

        let event_id = self
            .event_ids
            .entry(target.to_string())
            .or_insert_with(generate_event_id)
            .clone();
        let batch = BatchInfo::new(target, agent, &event_id, skill, scheduled);
        let batch = match self.tracker.reserve(batch, now) {
            Ok(batch) => batch,
            Err(e) => {
                self.planner.rewind(target, scheduled_end, previous_end);
                if e.is_capacity_wait() {
                    self.sink
                        .record(EventRecord::capacity_waiting(target, agent, &e.to_string()));
                }
                return Err(e);
            }
        };
        self.sink.record(EventRecord::batch_scheduled(
            target,
            &batch.id,
            &batch.cycle_type.to_string(),
            batch.threads(),
        ));

        let mut pids = Vec::with_capacity(batch.cycle.legs().len());
        for leg in batch.cycle.legs() {
            if leg.threads == 0 {
                continue;
            }
            match self
                .client
                .dispatch(agent, leg.op, leg.threads, target, leg.start_ms)
                .await
            {
                Ok(pid) => pids.push(pid),
                Err(e) => {
                    if pids.is_empty() {
                        self.tracker.abandon(&batch.id);
                        self.planner.rewind(target, scheduled_end, previous_end);
                    } else {
                        // Launched legs cannot be recalled: keep their threads and landing slot
                        tracing::warn!(
                            batch_id = %batch.id,
                            launched = pids.len(),
                            window_end_ms = batch.window.end_ms,
                            "Abandoning batch with legs already launched"
                        );
                        self.tracker.abandon_launched(&batch.id, pids)?;
                    }
                    self.sink
                        .record(EventRecord::batch_abandoned(target, &batch.id, &e.to_string()));
                    return Err(e);
                }
            }
        }

        let dispatched = self.tracker.mark_dispatched(&batch.id, pids)?.clone();
        self.sink.record(EventRecord::batch_dispatched(
            target,
            &dispatched.id,
            agent,
            &dispatched.pids,
        ));
        tracing::info!(
            target_host = target,
            agent,
            batch_id = %dispatched.id,
            cycle_type = %dispatched.cycle_type,
            threads = dispatched.threads(),
            window_start_ms = dispatched.window.start_ms,
            window_end_ms = dispatched.window.end_ms,
            "Dispatched batch"
        );
        Ok(dispatched)
    }

    /// Batches against `target` whose windows have not elapsed
    pub fn in_flight_batches(&self, target: &str) -> Vec<BatchInfo> {
        self.tracker
            .in_flight(target, self.clock.now_ms())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Flag in-flight batches composed at another level; returns newly stale ones
    pub fn refresh_staleness(&mut self, skill: u32) -> Vec<BatchInfo> {
        let stale = self.tracker.refresh_staleness(skill);
        for batch in &stale {
            self.sink.record(EventRecord::batch_stale(
                &batch.target,
                &batch.id,
                batch.player_level,
                skill,
            ));
        }
        stale
    }

    /// Drop elapsed batches and pipelines; returns how many batches elapsed
    pub fn reap(&mut self, now_ms: u64) -> usize {
        let elapsed = self.tracker.purge(now_ms);
        for batch in &elapsed {
            self.sink.record(EventRecord::batch_elapsed(&batch.target, &batch.id));
        }
        self.planner.prune(now_ms);
        elapsed.len()
    }
}
