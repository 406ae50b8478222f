//! Operation durations.

use crate::domain::{OpKind, PlayerState, TargetState};

/// Seconds of hack time per unit of skill factor
pub const HACK_TIME_MULTIPLIER: f64 = 5.0;
/// Grow duration relative to hack duration
pub const GROW_TIME_RATIO: f64 = 3.2;
/// Weaken duration relative to hack duration
pub const WEAKEN_TIME_RATIO: f64 = 4.0;
/// Share runs for a fixed ten seconds
pub const SHARE_DURATION_MS: f64 = 10_000.0;

const DIFFICULTY_FACTOR: f64 = 2.5;
const BASE_DIFFICULTY: f64 = 500.0;
const BASE_SKILL: f64 = 50.0;

/// Hack duration in milliseconds.
///
/// Scales with `required_skill * security` and inversely with player skill and
/// the hacking speed multiplier.
pub fn hack_time_ms(target: &TargetState, player: &PlayerState) -> f64 {
    let difficulty = target.required_skill as f64 * target.security;
    let skill_factor = (DIFFICULTY_FACTOR * difficulty + BASE_DIFFICULTY) / (player.skill as f64 + BASE_SKILL);
    let speed = player.multipliers.hacking_speed.max(f64::EPSILON);
    HACK_TIME_MULTIPLIER * skill_factor / speed * 1000.0
}

/// Duration of `op` against `target` in milliseconds
pub fn compute_duration(op: OpKind, target: &TargetState, player: &PlayerState) -> f64 {
    match op {
        OpKind::Hack => hack_time_ms(target, player),
        OpKind::Grow => hack_time_ms(target, player) * GROW_TIME_RATIO,
        OpKind::Weaken => hack_time_ms(target, player) * WEAKEN_TIME_RATIO,
        OpKind::Share => SHARE_DURATION_MS,
    }
}

/// Duration rounded up to whole milliseconds, as stored on a cycle leg
pub fn duration_ms(op: OpKind, target: &TargetState, player: &PlayerState) -> u64 {
    compute_duration(op, target, player).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n00dles() -> TargetState {
        TargetState {
            hostname: "n00dles".to_string(),
            money: 70_000.0,
            max_money: 1_750_000.0,
            security: 1.0,
            min_security: 1.0,
            required_skill: 1,
            growth: 3000.0,
            captured_at: 0,
        }
    }

    #[test]
    fn test_hack_time_baseline() {
        // (2.5 * 1 + 500) / (1 + 50) * 5s
        let t = hack_time_ms(&n00dles(), &PlayerState::new(1));
        assert!((t - 49_264.705_882).abs() < 0.01);
    }

    #[test]
    fn test_fixed_ratios() {
        let target = n00dles();
        let player = PlayerState::new(100);
        let hack = compute_duration(OpKind::Hack, &target, &player);
        assert!((compute_duration(OpKind::Grow, &target, &player) - hack * 3.2).abs() < 1e-9);
        assert!((compute_duration(OpKind::Weaken, &target, &player) - hack * 4.0).abs() < 1e-9);
        assert_eq!(compute_duration(OpKind::Share, &target, &player), 10_000.0);
    }

    #[test]
    fn test_duration_falls_with_skill() {
        let target = n00dles();
        let slow = compute_duration(OpKind::Weaken, &target, &PlayerState::new(10));
        let fast = compute_duration(OpKind::Weaken, &target, &PlayerState::new(500));
        assert!(fast < slow);
    }

    #[test]
    fn test_duration_rises_with_security() {
        let mut target = n00dles();
        let player = PlayerState::new(50);
        let at_floor = compute_duration(OpKind::Hack, &target, &player);
        target.security = 20.0;
        assert!(compute_duration(OpKind::Hack, &target, &player) > at_floor);
    }

    #[test]
    fn test_speed_multiplier_shortens() {
        let target = n00dles();
        let mut player = PlayerState::new(50);
        let base = hack_time_ms(&target, &player);
        player.multipliers.hacking_speed = 2.0;
        assert!((hack_time_ms(&target, &player) - base / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_duration_is_pure() {
        let target = n00dles();
        let player = PlayerState::new(77);
        for op in [OpKind::Hack, OpKind::Grow, OpKind::Weaken, OpKind::Share] {
            assert_eq!(duration_ms(op, &target, &player), duration_ms(op, &target, &player));
        }
    }
}
