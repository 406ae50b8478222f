//! Target and player snapshots
//!
//! A `TargetState` is captured immediately before each composition decision and is
//! never mutated afterwards; the composer owns it for the duration of one pass.

use serde::{Deserialize, Serialize};

/// Security differences below this are treated as "at the floor"
pub const SECURITY_EPSILON: f64 = 1e-9;

/// Snapshot of a remote resource's money pool and security level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    /// Hostname of the target
    pub hostname: String,
    /// Money currently available
    pub money: f64,
    /// Money ceiling
    pub max_money: f64,
    /// Current security level
    pub security: f64,
    /// Security floor
    pub min_security: f64,
    /// Hacking skill the target requires
    pub required_skill: u32,
    /// Growth parameter (percent units, e.g. 3000 for 30x)
    pub growth: f64,
    /// Monotonic timestamp (ms) the snapshot was taken at
    pub captured_at: u64,
}

impl TargetState {
    /// Security above the floor, never negative
    pub fn security_excess(&self) -> f64 {
        (self.security - self.min_security).max(0.0)
    }

    /// Returns true if security is at the floor
    pub fn is_at_floor(&self) -> bool {
        self.security_excess() <= SECURITY_EPSILON
    }

    /// Returns true if money is at the ceiling
    pub fn is_at_max(&self) -> bool {
        self.money >= self.max_money
    }

    /// Returns true if the target is ready for a full extraction cycle
    pub fn is_prepped(&self) -> bool {
        self.is_at_floor() && self.is_at_max()
    }

    /// Fraction of max money currently held
    pub fn money_ratio(&self) -> f64 {
        if self.max_money <= 0.0 {
            return 0.0;
        }
        (self.money / self.max_money).clamp(0.0, 1.0)
    }
}

/// Player-side modifiers applied to durations and effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Multipliers {
    #[serde(rename = "hacking-speed")]
    pub hacking_speed: f64,
    #[serde(rename = "hacking-money")]
    pub hacking_money: f64,
    #[serde(rename = "hacking-grow")]
    pub hacking_grow: f64,
    #[serde(rename = "hacking-chance")]
    pub hacking_chance: f64,
    /// Scales security removed per weaken thread
    pub weaken: f64,
    #[serde(rename = "script-hack-money")]
    pub script_hack_money: f64,
    #[serde(rename = "server-growth-rate")]
    pub server_growth_rate: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            hacking_speed: 1.0,
            hacking_money: 1.0,
            hacking_grow: 1.0,
            hacking_chance: 1.0,
            weaken: 1.0,
            script_hack_money: 1.0,
            server_growth_rate: 1.0,
        }
    }
}

/// Player hacking skill and multipliers captured alongside a target snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub skill: u32,
    pub multipliers: Multipliers,
}

impl PlayerState {
    pub fn new(skill: u32) -> Self {
        Self {
            skill,
            multipliers: Multipliers::default(),
        }
    }

    pub fn with_multipliers(mut self, multipliers: Multipliers) -> Self {
        self.multipliers = multipliers;
        self
    }
}
