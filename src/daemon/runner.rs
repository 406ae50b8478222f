//! The scheduling loop
//!
//! One cooperative loop owns the coordinator. Recoverable failures never end
//! the loop; they push the target's next attempt back by an exponential delay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::tick::{TargetStatus, TickConfig, TickState};
use crate::agent::Clock;
use crate::coordinator::BatchCoordinator;
use crate::domain::{EventRecord, HackMode};
use crate::error::{BatchrError, Result};
use crate::scheduler::Backoff;
use crate::sink::EventSink;

/// A target the loop keeps feeding, and where its legs run
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPlan {
    pub hostname: String,
    pub mode: HackMode,
    pub agent: String,
}

impl TargetPlan {
    pub fn new(hostname: &str, mode: HackMode, agent: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            mode,
            agent: agent.to_string(),
        }
    }
}

#[derive(Debug)]
struct TargetSlot {
    plan: TargetPlan,
    /// Holds the clock time before which the target is skipped
    backoff: Backoff,
}

/// Drives `request_cycle` for every configured target, one tick at a time
pub struct Daemon {
    coordinator: BatchCoordinator,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    config: TickConfig,
    slots: Vec<TargetSlot>,
    state: TickState,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("slots", &self.slots)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    pub fn new(
        coordinator: BatchCoordinator,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        config: TickConfig,
        targets: Vec<TargetPlan>,
    ) -> Self {
        let slots = targets
            .into_iter()
            .map(|plan| TargetSlot {
                plan,
                backoff: Backoff::new(config.backoff.clone()),
            })
            .collect();
        Self {
            coordinator,
            clock,
            sink,
            config,
            slots,
            state: TickState::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> &TickState {
        &self.state
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    /// Clock time before which `target` will not be retried, if it is backing off
    pub fn retry_at_ms(&self, target: &str) -> Option<u64> {
        self.slots
            .iter()
            .find(|s| s.plan.hostname == target)
            .and_then(|s| s.backoff.retry_at_ms)
    }

    /// Flag that stops the loop before its next tick when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run one tick; returns the number of batches dispatched.
    ///
    /// Only non-recoverable errors (unknown agent, broken snapshot store) are returned.
    pub async fn tick(&mut self) -> Result<usize> {
        let now = self.clock.now_ms();
        self.state.tick();
        let elapsed = self.coordinator.reap(now);
        self.state.elapsed(elapsed);

        let mut dispatched = 0;
        for slot in &mut self.slots {
            let target = slot.plan.hostname.clone();
            if slot.backoff.is_backing_off(now) {
                continue;
            }
            if self.coordinator.in_flight_batches(&target).len() >= self.config.pipeline_depth {
                self.state.set_status(&target, TargetStatus::InFlight);
                continue;
            }

            match self
                .coordinator
                .request_cycle(&target, slot.plan.mode, &slot.plan.agent)
                .await
            {
                Ok(_) => {
                    slot.backoff.record_success(now);
                    self.state.dispatched(&target);
                    dispatched += 1;
                }
                Err(BatchrError::NothingToDo(reason)) => {
                    log::debug!("{}: nothing to do: {}", target, reason);
                    self.state.set_status(&target, TargetStatus::NothingToDo);
                }
                Err(e) if e.is_recoverable() => {
                    // A missed deadline waits out one cycle duration before retrying
                    let hint_ms = match &e {
                        BatchrError::PastDeadline { retry_after_ms, .. } => Some(*retry_after_ms),
                        _ => None,
                    };
                    let delay_ms = slot.backoff.record_miss(now, hint_ms);
                    if e.is_capacity_wait() {
                        tracing::info!(
                            target_host = %target,
                            agent = %slot.plan.agent,
                            retry_in_ms = delay_ms,
                            "Waiting for capacity: {}",
                            e
                        );
                        self.state.missed(&target, TargetStatus::WaitingForCapacity);
                    } else {
                        tracing::warn!(target_host = %target, retry_in_ms = delay_ms, "Retrying after: {}", e);
                        self.state.missed(&target, TargetStatus::BackingOff);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(dispatched)
    }

    /// Tick until `max_ticks` or shutdown, sleeping through the clock between ticks
    pub async fn run(&mut self) -> Result<TickState> {
        let targets: Vec<String> = self.slots.iter().map(|s| s.plan.hostname.clone()).collect();
        self.sink.record(EventRecord::loop_started(&targets));
        tracing::info!(
            targets = targets.len(),
            tick_interval_ms = self.config.tick_interval_ms,
            "Scheduling loop started"
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                self.state.request_shutdown();
            }
            if self.state.should_stop(&self.config) {
                break;
            }
            self.tick().await?;
            if self.state.should_stop(&self.config) {
                break;
            }
            self.clock.sleep_ms(self.config.tick_interval_ms).await;
        }

        self.sink.record(EventRecord::loop_stopped(self.state.tick_count));
        tracing::info!(
            ticks = self.state.tick_count,
            dispatched = self.state.total_dispatched,
            "Scheduling loop stopped"
        );
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ExecutionAgentClient, ManualClock, SimulatedAgent};
    use crate::composer::ComposerConfig;
    use crate::domain::{TargetState, event_types};
    use crate::scheduler::{BackoffConfig, TimingConfig};
    use crate::sink::MemorySink;

    fn n00dles() -> TargetState {
        TargetState {
            hostname: "n00dles".to_string(),
            money: 1_750_000.0,
            max_money: 1_750_000.0,
            security: 1.0,
            min_security: 1.0,
            required_skill: 1,
            growth: 3000.0,
            captured_at: 0,
        }
    }

    fn daemon(threads: u32, config: TickConfig, agent_name: &str) -> (Arc<ManualClock>, Arc<SimulatedAgent>, Arc<MemorySink>, Daemon) {
        daemon_with_timing(threads, config, agent_name, TimingConfig::default())
    }

    fn daemon_with_timing(
        threads: u32,
        config: TickConfig,
        agent_name: &str,
        timing: TimingConfig,
    ) -> (Arc<ManualClock>, Arc<SimulatedAgent>, Arc<MemorySink>, Daemon) {
        let clock = Arc::new(ManualClock::new(1_000));
        let agent = Arc::new(SimulatedAgent::new(clock.clone(), 100));
        agent.add_agent("home", threads, 1).unwrap();
        agent.add_target(n00dles()).unwrap();
        let sink = Arc::new(MemorySink::new());

        let mut coordinator = BatchCoordinator::new(
            agent.clone(),
            clock.clone(),
            sink.clone(),
            ComposerConfig::default(),
            timing,
        );
        coordinator.register_agent("home", threads, 1);

        let daemon = Daemon::new(
            coordinator,
            clock.clone(),
            sink.clone(),
            config,
            vec![TargetPlan::new("n00dles", HackMode::Normal, agent_name)],
        );
        (clock, agent, sink, daemon)
    }

    #[tokio::test]
    async fn test_run_pipelines_batches() {
        let (_clock, agent, sink, mut daemon) = daemon(512, TickConfig::new(1_000, Some(200)), "home");
        let state = daemon.run().await.unwrap();

        assert_eq!(state.tick_count, 200);
        assert!(state.total_dispatched >= 2, "dispatched {}", state.total_dispatched);
        assert_eq!(state.total_misses, 0);

        let stats = agent.stats().unwrap();
        assert_eq!(stats.drifted, 0);
        assert!(stats.money_stolen > 0.0);

        assert_eq!(sink.of_type(event_types::LOOP_STARTED).len(), 1);
        assert_eq!(sink.of_type(event_types::LOOP_STOPPED).len(), 1);
        assert!(!sink.of_type(event_types::BATCH_ELAPSED).is_empty());
    }

    #[tokio::test]
    async fn test_waits_for_capacity_with_backoff() {
        let config = TickConfig::new(100, None).with_backoff(BackoffConfig::new(200, 10_000));
        let (clock, _agent, sink, mut daemon) = daemon(2, config, "home");

        daemon.tick().await.unwrap();
        assert_eq!(daemon.state().status("n00dles"), TargetStatus::WaitingForCapacity);
        assert_eq!(daemon.state().total_misses, 1);

        // Still inside the 200ms backoff
        clock.advance(100);
        daemon.tick().await.unwrap();
        assert_eq!(daemon.state().total_misses, 1);

        clock.advance(100);
        daemon.tick().await.unwrap();
        assert_eq!(daemon.state().total_misses, 2);
        assert_eq!(daemon.state().waiting_for_capacity(), vec!["n00dles"]);
        assert_eq!(sink.of_type(event_types::CAPACITY_WAITING).len(), 2);
    }

    #[tokio::test]
    async fn test_missed_deadline_waits_one_cycle_duration() {
        // A 5s cycle cannot hold n00dles' ~67s weaken at skill 100
        let timing = TimingConfig {
            cycle_duration_ms: Some(5_000),
            ..TimingConfig::default()
        };
        let config = TickConfig::new(100, None).with_backoff(BackoffConfig::new(10, 1_000));
        let (clock, _agent, sink, mut daemon) = daemon_with_timing(512, config, "home", timing);

        daemon.tick().await.unwrap();
        assert_eq!(daemon.state().status("n00dles"), TargetStatus::WaitingForCapacity);
        assert_eq!(daemon.retry_at_ms("n00dles"), Some(1_000 + 5_000));
        assert_eq!(sink.of_type(event_types::DEADLINE_MISSED).len(), 1);

        // The 10ms backoff alone would have allowed a retry long before this
        clock.advance(4_900);
        daemon.tick().await.unwrap();
        assert_eq!(daemon.state().total_misses, 1);

        clock.advance(100);
        daemon.tick().await.unwrap();
        assert_eq!(daemon.state().total_misses, 2);
    }

    #[tokio::test]
    async fn test_success_clears_backoff() {
        let config = TickConfig::new(100, None).with_backoff(BackoffConfig::new(200, 10_000));
        let (clock, agent, _sink, mut daemon) = daemon(2, config, "home");

        daemon.tick().await.unwrap();
        assert_eq!(daemon.retry_at_ms("n00dles"), Some(1_200));

        agent.add_agent("home", 512, 1).unwrap();
        daemon.coordinator.register_agent("home", 512, 1);
        clock.advance(200);
        assert_eq!(daemon.tick().await.unwrap(), 1);
        assert_eq!(daemon.retry_at_ms("n00dles"), None);
    }

    #[tokio::test]
    async fn test_in_flight_target_is_not_refilled() {
        let (_clock, _agent, _sink, mut daemon) = daemon(512, TickConfig::new(100, None), "home");
        assert_eq!(daemon.tick().await.unwrap(), 1);
        assert_eq!(daemon.tick().await.unwrap(), 0);
        assert_eq!(daemon.state().status("n00dles"), TargetStatus::InFlight);
    }

    #[tokio::test]
    async fn test_unknown_agent_is_fatal() {
        let (_clock, _agent, _sink, mut daemon) = daemon(512, TickConfig::new(100, Some(5)), "pserv-0");
        assert!(matches!(daemon.run().await, Err(BatchrError::UnknownAgent(_))));
    }

    #[tokio::test]
    async fn test_shutdown_handle_stops_loop() {
        let (_clock, _agent, _sink, mut daemon) = daemon(512, TickConfig::new(100, None), "home");
        daemon.shutdown_handle().store(true, Ordering::SeqCst);
        let state = daemon.run().await.unwrap();
        assert_eq!(state.tick_count, 0);
        assert!(state.shutdown_requested);
    }

    #[tokio::test]
    async fn test_target_returns_to_prepped_between_batches() {
        let (clock, agent, _sink, mut daemon) = daemon(512, TickConfig::new(1_000, Some(150)), "home");
        daemon.run().await.unwrap();

        clock.advance(600_000);
        let after = agent.target_state("n00dles").await.unwrap();
        assert!(after.is_prepped(), "money {} security {}", after.money, after.security);
    }
}
