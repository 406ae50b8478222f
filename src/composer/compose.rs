//! Cycle composition.

use serde::{Deserialize, Serialize};

use crate::domain::{Cycle, CycleInfo, HackMode, OpKind, PlayerState, StockBias, TargetState};
use crate::error::{BatchrError, Result};
use crate::formulas::{
    GROW_FORTIFY, HACK_FORTIFY, duration_ms, grow_threads_needed, growth_multiplier, hack_percent, security_delta,
    weaken_per_thread, weaken_threads_for,
};

/// Extraction policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Fraction of current money a Normal-mode hack cycle takes.
    #[serde(rename = "hack-fraction")]
    pub hack_fraction: f64,

    #[serde(rename = "min-hack-fraction")]
    pub min_hack_fraction: f64,

    #[serde(rename = "max-hack-fraction")]
    pub max_hack_fraction: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            hack_fraction: 0.1,
            min_hack_fraction: 0.01,
            max_hack_fraction: 0.5,
        }
    }
}

impl ComposerConfig {
    /// Configured fraction clamped to `[min, max]`
    pub fn effective_fraction(&self) -> f64 {
        self.hack_fraction.clamp(self.min_hack_fraction, self.max_hack_fraction)
    }

    /// Fraction used for a given mode
    fn fraction_for(&self, mode: HackMode) -> f64 {
        match mode {
            HackMode::StockMarket { bias: StockBias::Short } => {
                (self.effective_fraction() * 2.0).min(self.max_hack_fraction)
            }
            _ => self.effective_fraction(),
        }
    }
}

/// Thread counts of a candidate hack cycle
#[derive(Debug, Clone, Copy)]
struct HackPlan {
    h: u32,
    wh: u32,
    g: u32,
    wg: u32,
    money_fraction: f64,
}

impl HackPlan {
    fn total(&self) -> u32 {
        self.h + self.wh + self.g + self.wg
    }
}

/// Sizes cycle legs for a target.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Compose one cycle for `target` that fits in `available` threads on an
    /// agent with `cores` cores.
    pub fn compose_cycle(
        &self,
        mode: HackMode,
        target: &TargetState,
        player: &PlayerState,
        available: u32,
        cores: u32,
    ) -> Result<Cycle> {
        if available == 0 {
            return Err(BatchrError::InsufficientCapacity { needed: 1, available });
        }

        if mode == HackMode::ShareAll {
            return Ok(self.share_cycle(target, player, available));
        }

        if target.max_money <= 0.0 {
            return Err(BatchrError::NothingToDo(format!("{} holds no money", target.hostname)));
        }

        if !target.is_at_floor() {
            return Ok(self.weaken_cycle(target, player, available, cores));
        }

        if !target.is_at_max() {
            return self.grow_cycle(target, player, available, cores);
        }

        if mode == (HackMode::StockMarket { bias: StockBias::Long }) {
            return Err(BatchrError::NothingToDo(format!(
                "{} is prepped and a long position forbids hacking",
                target.hostname
            )));
        }

        self.hack_cycle(mode, target, player, available, cores)
    }

    fn share_cycle(&self, target: &TargetState, player: &PlayerState, available: u32) -> Cycle {
        Cycle::Share {
            s: CycleInfo::new(OpKind::Share, available, duration_ms(OpKind::Share, target, player), 0.0),
        }
    }

    fn weaken_cycle(&self, target: &TargetState, player: &PlayerState, available: u32, cores: u32) -> Cycle {
        let m = &player.multipliers;
        let needed = weaken_threads_for(target.security_excess(), weaken_per_thread(cores, m));
        let threads = needed.clamp(1, available);

        if threads < needed {
            log::debug!(
                "{}: weaken needs {} threads, only {} available; partial weaken",
                target.hostname,
                needed,
                threads
            );
        }

        Cycle::Weaken {
            w: self.weaken_leg(threads, target, player, cores),
        }
    }

    fn grow_cycle(&self, target: &TargetState, player: &PlayerState, available: u32, cores: u32) -> Result<Cycle> {
        let per_thread = weaken_per_thread(cores, &player.multipliers);
        let needed = grow_threads_needed(target.money, target, player, cores)
            .ok_or_else(|| BatchrError::NothingToDo(format!("{} cannot grow", target.hostname)))?;
        if needed == 0 {
            return Err(BatchrError::NothingToDo(format!("{} is already at max money", target.hostname)));
        }

        let offset = |g: u32| weaken_threads_for(g as f64 * GROW_FORTIFY, per_thread);

        // Closed-form starting point, then walk to the largest g that fits
        let estimate = (available as f64 * per_thread / (per_thread + GROW_FORTIFY)).floor() as u32;
        let mut g = estimate.min(needed);
        while g > 0 && g + offset(g) > available {
            g -= 1;
        }
        while g < needed && (g + 1) + offset(g + 1) <= available {
            g += 1;
        }

        if g == 0 {
            return Err(BatchrError::InsufficientCapacity {
                needed: 1 + offset(1),
                available,
            });
        }

        Ok(Cycle::Grow {
            g: self.grow_leg(g, target, player, cores),
            wg: self.weaken_leg(offset(g), target, player, cores),
        })
    }

    fn hack_cycle(
        &self,
        mode: HackMode,
        target: &TargetState,
        player: &PlayerState,
        available: u32,
        cores: u32,
    ) -> Result<Cycle> {
        let pct = hack_percent(target, player);
        if pct <= 0.0 {
            return Err(BatchrError::NothingToDo(format!(
                "hacking {} yields nothing at skill {}",
                target.hostname, player.skill
            )));
        }

        let mut h = match mode {
            HackMode::XpFarm => 1,
            _ => ((self.config.fraction_for(mode) / pct).floor() as u32).max(1),
        };

        loop {
            let plan = self.hack_plan(h, pct, target, player, cores)?;
            let total = plan.total();
            if total <= available {
                log::debug!(
                    "{}: hack cycle h={} wh={} g={} wg={} takes {:.2}%",
                    target.hostname,
                    plan.h,
                    plan.wh,
                    plan.g,
                    plan.wg,
                    plan.money_fraction * 100.0
                );
                return Ok(self.build_hack_cycle(&plan, target, player, cores));
            }
            if h == 1 {
                return Err(BatchrError::InsufficientCapacity {
                    needed: total,
                    available,
                });
            }

            let scaled = (h as f64 * available as f64 / total as f64).floor() as u32;
            h = if scaled < h { scaled.max(1) } else { h - 1 };
        }
    }

    fn hack_plan(&self, h: u32, pct: f64, target: &TargetState, player: &PlayerState, cores: u32) -> Result<HackPlan> {
        let per_thread = weaken_per_thread(cores, &player.multipliers);
        let money_fraction = (h as f64 * pct).min(1.0);
        let remaining = target.money * (1.0 - money_fraction);

        let g = grow_threads_needed(remaining, target, player, cores)
            .ok_or_else(|| BatchrError::NothingToDo(format!("{} cannot regrow after a hack", target.hostname)))?
            .max(1);

        Ok(HackPlan {
            h,
            wh: weaken_threads_for(h as f64 * HACK_FORTIFY, per_thread),
            g,
            wg: weaken_threads_for(g as f64 * GROW_FORTIFY, per_thread),
            money_fraction,
        })
    }

    fn build_hack_cycle(&self, plan: &HackPlan, target: &TargetState, player: &PlayerState, cores: u32) -> Cycle {
        let h = CycleInfo::new(
            OpKind::Hack,
            plan.h,
            duration_ms(OpKind::Hack, target, player),
            security_delta(OpKind::Hack, plan.h, cores, &player.multipliers),
        )
        .with_money_effect(plan.money_fraction);

        Cycle::Hack {
            h,
            wh: self.weaken_leg(plan.wh, target, player, cores),
            g: self.grow_leg(plan.g, target, player, cores),
            wg: self.weaken_leg(plan.wg, target, player, cores),
        }
    }

    fn grow_leg(&self, threads: u32, target: &TargetState, player: &PlayerState, cores: u32) -> CycleInfo {
        CycleInfo::new(
            OpKind::Grow,
            threads,
            duration_ms(OpKind::Grow, target, player),
            security_delta(OpKind::Grow, threads, cores, &player.multipliers),
        )
        .with_money_effect(growth_multiplier(threads, target, player, cores))
    }

    fn weaken_leg(&self, threads: u32, target: &TargetState, player: &PlayerState, cores: u32) -> CycleInfo {
        CycleInfo::new(
            OpKind::Weaken,
            threads,
            duration_ms(OpKind::Weaken, target, player),
            security_delta(OpKind::Weaken, threads, cores, &player.multipliers),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CycleType;
    use crate::formulas::{WEAKEN_PER_THREAD, grown_money};

    const EPS: f64 = 1e-9;

    fn prepped() -> TargetState {
        TargetState {
            hostname: "joesguns".to_string(),
            money: 2_500_000.0,
            max_money: 2_500_000.0,
            security: 5.0,
            min_security: 5.0,
            required_skill: 10,
            growth: 40.0,
            captured_at: 0,
        }
    }

    fn player() -> PlayerState {
        PlayerState::new(100)
    }

    /// Weaken legs must remove at least what their paired leg adds, and not a full
    /// thread more.
    fn assert_cancels(raised: &CycleInfo, weaken: &CycleInfo) {
        let added = raised.security_delta;
        let removed = -weaken.security_delta;
        assert!(removed + EPS >= added, "weaken {} under-cancels {}", removed, added);
        assert!(removed - WEAKEN_PER_THREAD < added + EPS, "weaken {} over-cancels {}", removed, added);
    }

    #[test]
    fn test_scenario_a_full_hack_cycle() {
        let composer = Composer::default();
        let cycle = composer
            .compose_cycle(HackMode::Normal, &prepped(), &player(), 1000, 1)
            .unwrap();

        match &cycle {
            Cycle::Hack { h, wh, g, wg } => {
                assert!(h.threads > 0 && wh.threads > 0 && g.threads > 0 && wg.threads > 0);
                assert_cancels(h, wh);
                assert_cancels(g, wg);
                assert!(h.money_effect <= 0.1 + EPS);
            }
            other => panic!("expected hack cycle, got {:?}", other.cycle_type()),
        }
        assert!(cycle.total_threads() <= 1000);
    }

    #[test]
    fn test_grow_leg_restores_hacked_money() {
        let target = prepped();
        let cycle = Composer::default()
            .compose_cycle(HackMode::Normal, &target, &player(), 1000, 1)
            .unwrap();
        if let Cycle::Hack { h, g, .. } = cycle {
            let remaining = target.money * (1.0 - h.money_effect);
            assert!(grown_money(g.threads, remaining, &target, &player(), 1) >= target.max_money);
        } else {
            panic!("expected hack cycle");
        }
    }

    #[test]
    fn test_scenario_b_single_thread_is_insufficient() {
        let err = Composer::default()
            .compose_cycle(HackMode::Normal, &prepped(), &player(), 1, 1)
            .unwrap_err();
        match err {
            BatchrError::InsufficientCapacity { needed, available } => {
                assert_eq!(available, 1);
                assert!(needed >= 4);
            }
            other => panic!("expected InsufficientCapacity, got {}", other),
        }
    }

    #[test]
    fn test_zero_threads_is_insufficient() {
        let err = Composer::default()
            .compose_cycle(HackMode::Normal, &prepped(), &player(), 0, 1)
            .unwrap_err();
        assert!(matches!(err, BatchrError::InsufficientCapacity { available: 0, .. }));
    }

    #[test]
    fn test_never_exceeds_available_threads() {
        let composer = Composer::default();
        let mut half = prepped();
        half.money = 1_000_000.0;
        let mut soft = prepped();
        soft.security = 12.0;

        for target in [prepped(), half, soft] {
            for mode in [HackMode::Normal, HackMode::XpFarm, HackMode::ShareAll] {
                for available in [1, 2, 3, 4, 5, 8, 13, 20, 50, 100, 1000, 100_000] {
                    if let Ok(cycle) = composer.compose_cycle(mode, &target, &player(), available, 1) {
                        assert!(
                            cycle.total_threads() <= available,
                            "{:?} used {} of {}",
                            cycle.cycle_type(),
                            cycle.total_threads(),
                            available
                        );
                        assert!(cycle.legs().iter().all(|l| l.threads > 0));
                    }
                }
            }
        }
    }

    #[test]
    fn test_scales_down_hack_to_fit() {
        let composer = Composer::default();
        let full = composer
            .compose_cycle(HackMode::Normal, &prepped(), &player(), 1000, 1)
            .unwrap();
        let small = composer
            .compose_cycle(HackMode::Normal, &prepped(), &player(), 20, 1)
            .unwrap();

        let (Cycle::Hack { h: big_h, .. }, Cycle::Hack { h: small_h, wh, g, wg }) = (&full, &small) else {
            panic!("expected hack cycles");
        };
        assert!(small_h.threads < big_h.threads);
        assert!(small.total_threads() <= 20);
        assert_cancels(small_h, wh);
        assert_cancels(g, wg);
    }

    #[test]
    fn test_xp_farm_uses_single_hack_thread() {
        let cycle = Composer::default()
            .compose_cycle(HackMode::XpFarm, &prepped(), &player(), 1000, 1)
            .unwrap();
        match cycle {
            Cycle::Hack { h, .. } => assert_eq!(h.threads, 1),
            other => panic!("expected hack cycle, got {:?}", other.cycle_type()),
        }
    }

    #[test]
    fn test_stock_short_hacks_harder() {
        let composer = Composer::default();
        let normal = composer
            .compose_cycle(HackMode::Normal, &prepped(), &player(), 10_000, 1)
            .unwrap();
        let short = composer
            .compose_cycle(
                HackMode::StockMarket { bias: StockBias::Short },
                &prepped(),
                &player(),
                10_000,
                1,
            )
            .unwrap();
        assert!(short.legs()[0].threads > normal.legs()[0].threads);
    }

    #[test]
    fn test_stock_long_never_hacks() {
        let err = Composer::default()
            .compose_cycle(
                HackMode::StockMarket { bias: StockBias::Long },
                &prepped(),
                &player(),
                1000,
                1,
            )
            .unwrap_err();
        assert!(matches!(err, BatchrError::NothingToDo(_)));
    }

    #[test]
    fn test_weaken_cycle_when_above_floor() {
        let mut target = prepped();
        target.security = 6.0;
        let cycle = Composer::default()
            .compose_cycle(HackMode::Normal, &target, &player(), 1000, 1)
            .unwrap();
        match cycle {
            Cycle::Weaken { w } => {
                assert_eq!(w.threads, 20);
                assert!(-w.security_delta + EPS >= 1.0);
            }
            other => panic!("expected weaken cycle, got {:?}", other.cycle_type()),
        }
    }

    #[test]
    fn test_partial_weaken_when_short_on_capacity() {
        let mut target = prepped();
        target.security = 50.0;
        let cycle = Composer::default()
            .compose_cycle(HackMode::Normal, &target, &player(), 7, 1)
            .unwrap();
        assert_eq!(cycle.cycle_type(), CycleType::Weaken);
        assert_eq!(cycle.total_threads(), 7);
    }

    #[test]
    fn test_grow_cycle_when_below_max() {
        let mut target = prepped();
        target.money = 1_250_000.0;
        let cycle = Composer::default()
            .compose_cycle(HackMode::Normal, &target, &player(), 10_000, 1)
            .unwrap();
        match &cycle {
            Cycle::Grow { g, wg } => {
                assert_cancels(g, wg);
                assert!(grown_money(g.threads, target.money, &target, &player(), 1) >= target.max_money);
            }
            other => panic!("expected grow cycle, got {:?}", other.cycle_type()),
        }
    }

    #[test]
    fn test_grow_cycle_scaled_to_capacity() {
        let mut target = prepped();
        target.money = 100_000.0;
        let cycle = Composer::default()
            .compose_cycle(HackMode::Normal, &target, &player(), 30, 1)
            .unwrap();
        match &cycle {
            Cycle::Grow { g, wg } => {
                assert_cancels(g, wg);
                assert!(g.threads + wg.threads <= 30);
                // one more grow thread would not fit
                let next = weaken_threads_for((g.threads + 1) as f64 * GROW_FORTIFY, WEAKEN_PER_THREAD);
                assert!(g.threads + 1 + next > 30);
            }
            other => panic!("expected grow cycle, got {:?}", other.cycle_type()),
        }
    }

    #[test]
    fn test_grow_cycle_needs_two_threads() {
        let mut target = prepped();
        target.money = 1_000.0;
        let err = Composer::default()
            .compose_cycle(HackMode::Normal, &target, &player(), 1, 1)
            .unwrap_err();
        assert!(matches!(err, BatchrError::InsufficientCapacity { needed: 2, available: 1 }));
    }

    #[test]
    fn test_share_all_takes_everything() {
        let cycle = Composer::default()
            .compose_cycle(HackMode::ShareAll, &prepped(), &player(), 64, 1)
            .unwrap();
        assert_eq!(cycle.cycle_type(), CycleType::Share);
        assert_eq!(cycle.total_threads(), 64);
    }

    #[test]
    fn test_under_skilled_has_nothing_to_do() {
        let err = Composer::default()
            .compose_cycle(HackMode::Normal, &prepped(), &PlayerState::new(5), 1000, 1)
            .unwrap_err();
        assert!(matches!(err, BatchrError::NothingToDo(_)));
    }

    #[test]
    fn test_moneyless_target_has_nothing_to_do() {
        let target = TargetState {
            money: 0.0,
            max_money: 0.0,
            security: 9.0,
            ..prepped()
        };
        let composer = Composer::default();
        for mode in [HackMode::Normal, HackMode::XpFarm] {
            let err = composer.compose_cycle(mode, &target, &player(), 1000, 1).unwrap_err();
            assert!(matches!(err, BatchrError::NothingToDo(_)), "{:?}", err);
        }
        // Sharing does not depend on the target's money
        let share = composer.compose_cycle(HackMode::ShareAll, &target, &player(), 8, 1).unwrap();
        assert_eq!(share.cycle_type(), CycleType::Share);
    }

    #[test]
    fn test_effective_fraction_clamped() {
        let config = ComposerConfig {
            hack_fraction: 0.9,
            ..ComposerConfig::default()
        };
        assert_eq!(config.effective_fraction(), 0.5);
        let config = ComposerConfig {
            hack_fraction: 0.0,
            ..ComposerConfig::default()
        };
        assert_eq!(config.effective_fraction(), 0.01);
    }
}
