//! In-process execution agent.
//!
//! Legs are held until their completion time and applied to the simulated
//! target in completion order, the same way the remote environment would land
//! them. Each leg runs the drift check at its start: if the launch arrived too
//! late to start within tolerance of the plan, it exits without touching the
//! target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::ExecutionAgentClient;
use super::clock::Clock;
use crate::dispatch::within_drift;
use crate::domain::{Multipliers, OpKind, PlayerState, TargetState};
use crate::error::{BatchrError, Result};
use crate::formulas::{GROW_FORTIFY, duration_ms, grown_money, money_delta, weaken_reduction};

const MAX_SECURITY: f64 = 100.0;

/// Counters describing what the simulation has done so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    /// Legs accepted by `dispatch`
    pub launched: u64,
    /// Legs whose effect has been applied
    pub landed: u64,
    /// Legs that exited on the drift check
    pub drifted: u64,
    /// Launches refused (capacity, unknown host, injected failure)
    pub rejected: u64,
    /// Money removed by landed hacks
    pub money_stolen: f64,
}

#[derive(Debug, Clone, Copy)]
struct SimHost {
    threads: u32,
    cores: u32,
}

#[derive(Debug, Clone)]
struct RunningLeg {
    pid: u64,
    agent: String,
    op: OpKind,
    threads: u32,
    target: String,
    cores: u32,
    end_ms: u64,
}

#[derive(Debug)]
struct SimState {
    hosts: HashMap<String, SimHost>,
    targets: HashMap<String, TargetState>,
    player: PlayerState,
    running: Vec<RunningLeg>,
    next_pid: u64,
    fail_next: u32,
    stats: SimStats,
}

/// `ExecutionAgentClient` backed by an in-memory world
pub struct SimulatedAgent {
    clock: Arc<dyn Clock>,
    drift_tolerance_ms: u64,
    launch_delay_ms: u64,
    state: Mutex<SimState>,
}

impl std::fmt::Debug for SimulatedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedAgent")
            .field("drift_tolerance_ms", &self.drift_tolerance_ms)
            .field("launch_delay_ms", &self.launch_delay_ms)
            .finish_non_exhaustive()
    }
}

impl SimulatedAgent {
    pub fn new(clock: Arc<dyn Clock>, skill: u32) -> Self {
        Self {
            clock,
            drift_tolerance_ms: 100,
            launch_delay_ms: 0,
            state: Mutex::new(SimState {
                hosts: HashMap::new(),
                targets: HashMap::new(),
                player: PlayerState::new(skill),
                running: Vec::new(),
                next_pid: 1,
                fail_next: 0,
                stats: SimStats::default(),
            }),
        }
    }

    pub fn with_drift_tolerance(mut self, ms: u64) -> Self {
        self.drift_tolerance_ms = ms;
        self
    }

    /// Delay between a launch request and the leg actually being able to start
    pub fn with_launch_delay(mut self, ms: u64) -> Self {
        self.launch_delay_ms = ms;
        self
    }

    pub fn with_multipliers(self, multipliers: Multipliers) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.player.multipliers = multipliers;
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|e| BatchrError::InvalidState(format!("simulation state poisoned: {}", e)))
    }

    pub fn add_agent(&self, hostname: &str, threads: u32, cores: u32) -> Result<()> {
        self.lock()?
            .hosts
            .insert(hostname.to_string(), SimHost { threads, cores: cores.max(1) });
        Ok(())
    }

    pub fn add_target(&self, target: TargetState) -> Result<()> {
        self.lock()?.targets.insert(target.hostname.clone(), target);
        Ok(())
    }

    pub fn set_player_skill(&self, skill: u32) -> Result<()> {
        self.lock()?.player.skill = skill;
        Ok(())
    }

    /// Make the next `count` launches fail with `DispatchFailure`
    pub fn fail_next_dispatches(&self, count: u32) -> Result<()> {
        self.lock()?.fail_next = count;
        Ok(())
    }

    pub fn stats(&self) -> Result<SimStats> {
        Ok(self.lock()?.stats.clone())
    }

    /// Threads held by legs that have not completed yet
    pub fn running_threads(&self, agent: &str) -> Result<u32> {
        let now = self.clock.now_ms();
        let mut state = self.lock()?;
        settle(&mut state, now);
        Ok(used_threads(&state, agent))
    }

    /// Apply every leg that has completed by now
    pub fn settle(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut state = self.lock()?;
        Ok(settle(&mut state, now))
    }
}

fn used_threads(state: &SimState, agent: &str) -> u32 {
    state.running.iter().filter(|l| l.agent == agent).map(|l| l.threads).sum()
}

fn settle(state: &mut SimState, now_ms: u64) -> usize {
    let (mut landed, running): (Vec<RunningLeg>, Vec<RunningLeg>) =
        state.running.drain(..).partition(|l| l.end_ms <= now_ms);
    state.running = running;
    landed.sort_by_key(|l| (l.end_ms, l.pid));

    let count = landed.len();
    for leg in landed {
        let player = state.player.clone();
        let Some(target) = state.targets.get_mut(&leg.target) else {
            log::warn!("Leg {} landed on unknown target {}", leg.pid, leg.target);
            continue;
        };
        match leg.op {
            OpKind::Hack => {
                let delta = money_delta(leg.threads, target, &player);
                let remaining = target.money * (1.0 - delta.money_fraction);
                let stolen = target.money - remaining;
                target.money = remaining;
                target.security = delta.new_security.min(MAX_SECURITY);
                state.stats.money_stolen += stolen;
            }
            OpKind::Grow => {
                target.money = grown_money(leg.threads, target.money, target, &player, leg.cores);
                target.security = (target.security + leg.threads as f64 * GROW_FORTIFY).min(MAX_SECURITY);
            }
            OpKind::Weaken => {
                target.security -= weaken_reduction(leg.threads, target, leg.cores, &player.multipliers);
            }
            OpKind::Share => {}
        }
        state.stats.landed += 1;
    }
    count
}

#[async_trait]
impl ExecutionAgentClient for SimulatedAgent {
    async fn target_state(&self, hostname: &str) -> Result<TargetState> {
        let now = self.clock.now_ms();
        let mut state = self.lock()?;
        settle(&mut state, now);
        let mut target = state
            .targets
            .get(hostname)
            .cloned()
            .ok_or_else(|| BatchrError::InvalidState(format!("unknown target {}", hostname)))?;
        target.captured_at = now;
        Ok(target)
    }

    async fn available_threads(&self, agent: &str) -> Result<u32> {
        let now = self.clock.now_ms();
        let mut state = self.lock()?;
        settle(&mut state, now);
        let host = state
            .hosts
            .get(agent)
            .copied()
            .ok_or_else(|| BatchrError::UnknownAgent(agent.to_string()))?;
        Ok(host.threads.saturating_sub(used_threads(&state, agent)))
    }

    async fn dispatch(&self, agent: &str, op: OpKind, threads: u32, target: &str, start_at_ms: u64) -> Result<u64> {
        let now = self.clock.now_ms();
        let mut state = self.lock()?;
        settle(&mut state, now);

        let failure = |reason: String| BatchrError::DispatchFailure {
            agent: agent.to_string(),
            reason,
        };

        if state.fail_next > 0 {
            state.fail_next -= 1;
            state.stats.rejected += 1;
            return Err(failure("injected failure".to_string()));
        }
        let Some(host) = state.hosts.get(agent).copied() else {
            state.stats.rejected += 1;
            return Err(failure("unknown host".to_string()));
        };
        let free = host.threads.saturating_sub(used_threads(&state, agent));
        if threads == 0 || threads > free {
            state.stats.rejected += 1;
            return Err(failure(format!("{} threads requested, {} free", threads, free)));
        }
        let Some(snapshot) = state.targets.get(target) else {
            state.stats.rejected += 1;
            return Err(failure(format!("unknown target {}", target)));
        };

        let duration = duration_ms(op, snapshot, &state.player);
        let pid = state.next_pid;
        state.next_pid += 1;
        state.stats.launched += 1;

        let actual_start = start_at_ms.max(now + self.launch_delay_ms);
        if !within_drift(start_at_ms, actual_start, self.drift_tolerance_ms) {
            log::debug!(
                "Leg {} ({} x{} on {}) drifted {}ms; exiting",
                pid,
                op,
                threads,
                target,
                actual_start - start_at_ms
            );
            state.stats.drifted += 1;
            return Ok(pid);
        }

        state.running.push(RunningLeg {
            pid,
            agent: agent.to_string(),
            op,
            threads,
            target: target.to_string(),
            cores: host.cores,
            end_ms: actual_start + duration,
        });
        Ok(pid)
    }

    async fn player_skill(&self) -> Result<u32> {
        Ok(self.lock()?.player.skill)
    }
}
