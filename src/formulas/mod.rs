//! Duration/effect calculator
//!
//! Pure functions computing how long an operation takes and what it does to a
//! target. Nothing here holds state: identical inputs always give identical outputs,
//! which is what lets the composer and scheduler be tested without a live agent.
//!
//! Reference durations derive from the hack time; grow and weaken run at fixed
//! ratios of it (3.2x and 4x).

mod duration;
mod effect;

pub use duration::{
    GROW_TIME_RATIO, HACK_TIME_MULTIPLIER, SHARE_DURATION_MS, WEAKEN_TIME_RATIO, compute_duration, duration_ms,
    hack_time_ms,
};
pub use effect::{
    BASE_GROWTH_INCREMENT, GROW_FORTIFY, HACK_BALANCE_FACTOR, HACK_FORTIFY, MAX_GROWTH_LOG, MoneyDelta,
    WEAKEN_PER_THREAD, core_bonus, grow_threads_needed, growth_multiplier, grown_money, hack_chance, hack_percent,
    money_delta, security_delta, weaken_per_thread, weaken_reduction, weaken_threads_for,
};
