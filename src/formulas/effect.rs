//! Operation effects: security deltas, hack yield, grow multipliers.

use crate::domain::{Multipliers, OpKind, PlayerState, TargetState};

/// Security added per hack thread
pub const HACK_FORTIFY: f64 = 0.002;
/// Security added per grow thread
pub const GROW_FORTIFY: f64 = 2.0 * HACK_FORTIFY;
/// Security removed per weaken thread on a single-core agent
pub const WEAKEN_PER_THREAD: f64 = 0.05;
/// Growth increment before the security penalty
pub const BASE_GROWTH_INCREMENT: f64 = 0.03;
/// Ceiling on the per-cycle growth log
pub const MAX_GROWTH_LOG: f64 = 0.003_493_889_254_255_78;
/// Divisor turning hack skill/difficulty into a money fraction
pub const HACK_BALANCE_FACTOR: f64 = 240.0;

const HACK_CHANCE_FACTOR: f64 = 1.75;
const THREAD_EPSILON: f64 = 1e-9;

/// Extra effect per agent core for grow and weaken
pub fn core_bonus(cores: u32) -> f64 {
    1.0 + (cores.max(1) - 1) as f64 / 16.0
}

/// Security removed by one weaken thread
pub fn weaken_per_thread(cores: u32, multipliers: &Multipliers) -> f64 {
    WEAKEN_PER_THREAD * core_bonus(cores) * multipliers.weaken
}

/// Raw security delta of `threads` threads of `op`; negative for weaken
pub fn security_delta(op: OpKind, threads: u32, cores: u32, multipliers: &Multipliers) -> f64 {
    let threads = threads as f64;
    match op {
        OpKind::Hack => threads * HACK_FORTIFY,
        OpKind::Grow => threads * GROW_FORTIFY,
        OpKind::Weaken => -threads * weaken_per_thread(cores, multipliers),
        OpKind::Share => 0.0,
    }
}

/// Security actually removed by a weaken, capped at the target's floor
pub fn weaken_reduction(threads: u32, target: &TargetState, cores: u32, multipliers: &Multipliers) -> f64 {
    (threads as f64 * weaken_per_thread(cores, multipliers)).min(target.security_excess())
}

/// Weaken threads needed to remove `delta` security, rounded up.
///
/// Never under-cancels: `result * per_thread >= delta` up to float noise.
pub fn weaken_threads_for(delta: f64, per_thread: f64) -> u32 {
    if delta <= 0.0 || per_thread <= 0.0 {
        return 0;
    }
    (delta / per_thread - THREAD_EPSILON).ceil().max(1.0) as u32
}

/// Fraction of current money one hack thread takes, in `[0, 1]`
pub fn hack_percent(target: &TargetState, player: &PlayerState) -> f64 {
    let skill = player.skill.max(1) as f64;
    let difficulty_mult = (100.0 - target.security) / 100.0;
    let skill_mult = (skill - (target.required_skill as f64 - 1.0)) / skill;
    let m = &player.multipliers;
    let pct = difficulty_mult * skill_mult * m.hacking_money * m.script_hack_money / HACK_BALANCE_FACTOR;
    pct.clamp(0.0, 1.0)
}

/// Probability a single hack succeeds, in `[0, 1]`
pub fn hack_chance(target: &TargetState, player: &PlayerState) -> f64 {
    let skill_mult = HACK_CHANCE_FACTOR * player.skill.max(1) as f64;
    let skill_chance = (skill_mult - target.required_skill as f64) / skill_mult;
    let difficulty_mult = (100.0 - target.security) / 100.0;
    (skill_chance * difficulty_mult * player.multipliers.hacking_chance).clamp(0.0, 1.0)
}

/// Result of a hack against a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneyDelta {
    /// Fraction of current money removed
    pub money_fraction: f64,
    /// Security after the hack lands
    pub new_security: f64,
}

/// Money and security effect of `threads` hack threads
pub fn money_delta(threads: u32, target: &TargetState, player: &PlayerState) -> MoneyDelta {
    MoneyDelta {
        money_fraction: (threads as f64 * hack_percent(target, player)).min(1.0),
        new_security: target.security + threads as f64 * HACK_FORTIFY,
    }
}

/// Growth log per thread at the target's current security
fn growth_rate(target: &TargetState, player: &PlayerState, cores: u32) -> f64 {
    let security = target.security.max(f64::EPSILON);
    let log = (BASE_GROWTH_INCREMENT / security).ln_1p().min(MAX_GROWTH_LOG);
    let m = &player.multipliers;
    log * (target.growth / 100.0) * m.hacking_grow * core_bonus(cores) * m.server_growth_rate
}

/// Compounding money multiplier of `threads` grow threads
pub fn growth_multiplier(threads: u32, target: &TargetState, player: &PlayerState, cores: u32) -> f64 {
    (growth_rate(target, player, cores) * threads as f64).exp()
}

/// Money after growing `money` with `threads` threads, capped at max money
pub fn grown_money(threads: u32, money: f64, target: &TargetState, player: &PlayerState, cores: u32) -> f64 {
    let uncapped = (money.max(0.0) + threads as f64) * growth_multiplier(threads, target, player, cores);
    uncapped.min(target.max_money)
}

/// Minimal grow threads taking `from_money` to the target's max money.
///
/// Starts from the logarithmic estimate (which ignores the flat per-thread
/// addition and so overshoots) and binary-searches down to the exact minimum.
/// Returns `None` if growth is impossible.
pub fn grow_threads_needed(from_money: f64, target: &TargetState, player: &PlayerState, cores: u32) -> Option<u32> {
    let goal = target.max_money;
    if from_money >= goal {
        return Some(0);
    }
    let rate = growth_rate(target, player, cores);
    if rate <= 0.0 || !rate.is_finite() {
        return None;
    }

    let reaches = |n: u32| (from_money.max(0.0) + n as f64) * (rate * n as f64).exp() >= goal;

    let estimate = ((goal / from_money.max(1.0)).ln() / rate).ceil().max(1.0);
    if estimate > u32::MAX as f64 {
        return None;
    }
    let mut hi = estimate as u32;
    while !reaches(hi) {
        hi = hi.checked_mul(2)?;
    }

    let mut lo = 0u32;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if reaches(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Some(lo)
}
