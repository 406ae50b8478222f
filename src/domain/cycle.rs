//! Cycle model
//!
//! A cycle is one coordinated set of legs whose landing order on the target is fixed:
//! `Hack -> Weaken(hack) -> Grow -> Weaken(grow)`, or the trailing subset of it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::op::OpKind;

/// One leg of a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleInfo {
    /// Operation run by this leg
    pub op: OpKind,
    /// Thread count (never zero for a composed leg)
    pub threads: u32,
    /// Absolute start time on the monotonic clock; 0 until scheduled
    pub start_ms: u64,
    /// Execution duration computed at composition time
    pub duration_ms: u64,
    /// Security change on landing (negative for weaken, zero for share)
    pub security_delta: f64,
    /// Money fraction removed (hack) or money multiplier applied (grow)
    #[serde(default)]
    pub money_effect: f64,
}

impl CycleInfo {
    pub fn new(op: OpKind, threads: u32, duration_ms: u64, security_delta: f64) -> Self {
        Self {
            op,
            threads,
            start_ms: 0,
            duration_ms,
            security_delta,
            money_effect: 0.0,
        }
    }

    pub fn with_money_effect(mut self, money_effect: f64) -> Self {
        self.money_effect = money_effect;
        self
    }

    /// Time the leg lands on the target
    pub fn completion_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// Composition tag of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleType {
    Weaken,
    Grow,
    Hack,
    Share,
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleType::Weaken => "weaken",
            CycleType::Grow => "grow",
            CycleType::Hack => "hack",
            CycleType::Share => "share",
        };
        f.write_str(s)
    }
}

/// Cycle variants tagged by operation composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Cycle {
    /// Single weaken pulling security to the floor
    Weaken { w: CycleInfo },
    /// Grow followed by its offsetting weaken
    Grow { g: CycleInfo, wg: CycleInfo },
    /// Full extraction: hack, its weaken, grow, its weaken
    Hack {
        h: CycleInfo,
        wh: CycleInfo,
        g: CycleInfo,
        wg: CycleInfo,
    },
    /// Share-only cycle, no target interaction
    Share { s: CycleInfo },
}

impl Cycle {
    pub fn cycle_type(&self) -> CycleType {
        match self {
            Cycle::Weaken { .. } => CycleType::Weaken,
            Cycle::Grow { .. } => CycleType::Grow,
            Cycle::Hack { .. } => CycleType::Hack,
            Cycle::Share { .. } => CycleType::Share,
        }
    }

    /// Legs in required landing order
    pub fn legs(&self) -> Vec<&CycleInfo> {
        match self {
            Cycle::Weaken { w } => vec![w],
            Cycle::Grow { g, wg } => vec![g, wg],
            Cycle::Hack { h, wh, g, wg } => vec![h, wh, g, wg],
            Cycle::Share { s } => vec![s],
        }
    }

    /// Mutable legs in required landing order
    pub fn legs_mut(&mut self) -> Vec<&mut CycleInfo> {
        match self {
            Cycle::Weaken { w } => vec![w],
            Cycle::Grow { g, wg } => vec![g, wg],
            Cycle::Hack { h, wh, g, wg } => vec![h, wh, g, wg],
            Cycle::Share { s } => vec![s],
        }
    }

    pub fn total_threads(&self) -> u32 {
        self.legs().iter().map(|l| l.threads).sum()
    }

    pub fn longest_duration_ms(&self) -> u64 {
        self.legs().iter().map(|l| l.duration_ms).max().unwrap_or(0)
    }

    /// Earliest leg start
    pub fn first_start_ms(&self) -> u64 {
        self.legs().iter().map(|l| l.start_ms).min().unwrap_or(0)
    }

    /// Latest leg completion
    pub fn last_completion_ms(&self) -> u64 {
        self.legs().iter().map(|l| l.completion_ms()).max().unwrap_or(0)
    }

    /// Interval during which the legs land on the target
    pub fn landing_window(&self) -> (u64, u64) {
        let completions = self.legs().iter().map(|l| l.completion_ms()).collect::<Vec<_>>();
        let first = completions.iter().copied().min().unwrap_or(0);
        let last = completions.iter().copied().max().unwrap_or(0);
        (first, last)
    }
}
