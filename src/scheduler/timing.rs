//! Start-time assignment for cycle legs.
//!
//! Legs are back-computed from a common completion anchor: the last leg in landing
//! order completes exactly at the anchor, and every earlier leg completes one safety
//! gap before its successor. A leg's start is therefore
//! `anchor - gap * (position from end) - duration`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::Cycle;
use crate::error::{BatchrError, Result};

/// Timing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum spacing between two legs' completions
    #[serde(rename = "safety-gap-ms")]
    pub safety_gap_ms: u64,

    /// Time an agent needs between the dispatch call and a leg's start
    #[serde(rename = "dispatch-latency-ms")]
    pub dispatch_latency_ms: u64,

    /// Agents abort a leg whose actual start drifts further than this from plan
    #[serde(rename = "drift-tolerance-ms")]
    pub drift_tolerance_ms: u64,

    /// Slack added on top of the minimal cycle duration
    #[serde(rename = "cycle-padding-ms")]
    pub cycle_padding_ms: u64,

    /// Fixed anchor offset for every cycle; unset means minimal plus padding
    #[serde(rename = "cycle-duration-ms")]
    pub cycle_duration_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            safety_gap_ms: 30,
            dispatch_latency_ms: 50,
            drift_tolerance_ms: 100,
            cycle_padding_ms: 200,
            cycle_duration_ms: None,
        }
    }
}

/// Assign start times so the cycle's last leg completes at `now + cycle_duration_ms`.
///
/// No dispatch latency is assumed; see [`schedule_at_anchor`].
pub fn schedule_cycle(cycle: Cycle, cycle_duration_ms: u64, now_ms: u64, safety_gap_ms: u64) -> Result<Cycle> {
    schedule_at_anchor(cycle, now_ms + cycle_duration_ms, now_ms, safety_gap_ms, 0)
}

/// Assign start times so the cycle's last leg completes at `anchor_ms`.
///
/// Fails with `PastDeadline` if any leg would have to start before
/// `now_ms + dispatch_latency_ms`. The error carries `anchor - now` as the
/// wait before retrying.
pub fn schedule_at_anchor(
    mut cycle: Cycle,
    anchor_ms: u64,
    now_ms: u64,
    safety_gap_ms: u64,
    dispatch_latency_ms: u64,
) -> Result<Cycle> {
    let starts = leg_starts(&cycle, anchor_ms, safety_gap_ms);
    let not_before_ms = now_ms + dispatch_latency_ms;

    let earliest_start_ms = starts.iter().copied().min().unwrap_or(anchor_ms as i64);
    if earliest_start_ms < not_before_ms as i64 {
        return Err(BatchrError::PastDeadline {
            earliest_start_ms,
            not_before_ms,
            retry_after_ms: anchor_ms.saturating_sub(now_ms),
        });
    }

    for (leg, start) in cycle.legs_mut().into_iter().zip(starts) {
        leg.start_ms = start as u64;
    }
    Ok(cycle)
}

/// Length of the landing window: one gap between each consecutive pair of legs
pub fn landing_span_ms(cycle: &Cycle, safety_gap_ms: u64) -> u64 {
    safety_gap_ms * (cycle.legs().len() as u64).saturating_sub(1)
}

/// Shortest anchor offset from `now` for which no leg starts in the past
pub fn min_cycle_duration_ms(cycle: &Cycle, safety_gap_ms: u64, dispatch_latency_ms: u64) -> u64 {
    let n = cycle.legs().len() as u64;
    cycle
        .legs()
        .iter()
        .enumerate()
        .map(|(i, leg)| leg.duration_ms + safety_gap_ms * (n - 1 - i as u64))
        .max()
        .unwrap_or(0)
        + dispatch_latency_ms
}

fn leg_starts(cycle: &Cycle, anchor_ms: u64, safety_gap_ms: u64) -> Vec<i64> {
    let legs = cycle.legs();
    let n = legs.len() as i64;
    legs.iter()
        .enumerate()
        .map(|(i, leg)| anchor_ms as i64 - safety_gap_ms as i64 * (n - 1 - i as i64) - leg.duration_ms as i64)
        .collect()
}

/// Per-target pipeline of landing windows.
///
/// Successive cycles against the same target are anchored at least one landing
/// span plus one gap after the previous cycle's last completion, so two cycles'
/// landing windows never interleave on the target.
#[derive(Debug, Clone, Default)]
pub struct TimingPlanner {
    config: TimingConfig,
    /// Last scheduled completion per target
    landings: HashMap<String, u64>,
}

impl TimingPlanner {
    pub fn new(config: TimingConfig) -> Self {
        Self {
            config,
            landings: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// The configured fixed cycle duration, or minimal plus padding
    pub fn cycle_duration_ms(&self, cycle: &Cycle) -> u64 {
        self.config.cycle_duration_ms.unwrap_or_else(|| {
            min_cycle_duration_ms(cycle, self.config.safety_gap_ms, self.config.dispatch_latency_ms)
                + self.config.cycle_padding_ms
        })
    }

    /// Schedule `cycle` against `target`, pipelined after any earlier cycle.
    pub fn schedule(&mut self, target: &str, cycle: Cycle, cycle_duration_ms: u64, now_ms: u64) -> Result<Cycle> {
        let gap = self.config.safety_gap_ms;
        let mut anchor_ms = now_ms + cycle_duration_ms;
        if let Some(&last) = self.landings.get(target) {
            anchor_ms = anchor_ms.max(last + gap + landing_span_ms(&cycle, gap));
        }

        let scheduled = schedule_at_anchor(cycle, anchor_ms, now_ms, gap, self.config.dispatch_latency_ms)?;
        self.landings.insert(target.to_string(), scheduled.last_completion_ms());

        tracing::debug!(
            target_host = target,
            anchor_ms,
            first_start_ms = scheduled.first_start_ms(),
            "Scheduled cycle"
        );
        Ok(scheduled)
    }

    /// Last scheduled completion for `target`
    pub fn landing_end(&self, target: &str) -> Option<u64> {
        self.landings.get(target).copied()
    }

    /// Drop the pipeline for `target` so the next cycle anchors from `now` again.
    ///
    /// Used when a reserved batch is abandoned before anything was launched.
    pub fn forget(&mut self, target: &str) {
        self.landings.remove(target);
    }

    /// Roll the pipeline back to `landing_end` if `target` still ends at `expected`
    pub fn rewind(&mut self, target: &str, expected: u64, landing_end: Option<u64>) {
        if self.landings.get(target) == Some(&expected) {
            match landing_end {
                Some(end) => {
                    self.landings.insert(target.to_string(), end);
                }
                None => {
                    self.landings.remove(target);
                }
            }
        }
    }

    /// Forget pipelines whose last landing is already in the past
    pub fn prune(&mut self, now_ms: u64) {
        self.landings.retain(|_, end| *end > now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CycleInfo, OpKind};

    fn hack_cycle() -> Cycle {
        Cycle::Hack {
            h: CycleInfo::new(OpKind::Hack, 10, 900, 0.02),
            wh: CycleInfo::new(OpKind::Weaken, 1, 3600, -0.05),
            g: CycleInfo::new(OpKind::Grow, 20, 2880, 0.08),
            wg: CycleInfo::new(OpKind::Weaken, 2, 3600, -0.1),
        }
    }

    fn completions(cycle: &Cycle) -> Vec<u64> {
        cycle.legs().iter().map(|l| l.completion_ms()).collect()
    }

    #[test]
    fn test_completion_order_with_gaps() {
        let scheduled = schedule_cycle(hack_cycle(), 4000, 10_000, 20).unwrap();
        let done = completions(&scheduled);
        assert_eq!(done, vec![13_940, 13_960, 13_980, 14_000]);
        for pair in done.windows(2) {
            assert!(pair[1] >= pair[0] + 20);
        }
    }

    #[test]
    fn test_starts_back_computed_from_anchor() {
        let scheduled = schedule_cycle(hack_cycle(), 4000, 10_000, 20).unwrap();
        let starts: Vec<u64> = scheduled.legs().iter().map(|l| l.start_ms).collect();
        // anchor 14_000: h = 14_000 - 60 - 900, wh = 14_000 - 40 - 3600, ...
        assert_eq!(starts, vec![13_040, 10_360, 11_100, 10_400]);
    }

    #[test]
    fn test_subset_cycles_keep_order() {
        let grow = Cycle::Grow {
            g: CycleInfo::new(OpKind::Grow, 5, 3200, 0.02),
            wg: CycleInfo::new(OpKind::Weaken, 1, 4000, -0.05),
        };
        let scheduled = schedule_cycle(grow, 4500, 0, 50).unwrap();
        let done = completions(&scheduled);
        assert_eq!(done, vec![4450, 4500]);
    }

    #[test]
    fn test_rejects_start_in_past() {
        let err = schedule_cycle(hack_cycle(), 3000, 10_000, 20).unwrap_err();
        match err {
            BatchrError::PastDeadline {
                earliest_start_ms,
                not_before_ms,
                retry_after_ms,
            } => {
                assert_eq!(not_before_ms, 10_000);
                assert_eq!(earliest_start_ms, 13_000 - 40 - 3600);
                assert_eq!(retry_after_ms, 3000);
            }
            other => panic!("expected PastDeadline, got {}", other),
        }
    }

    #[test]
    fn test_dispatch_latency_counts_against_deadline() {
        // Fits exactly without latency, fails once 1ms of latency is required
        let exact = min_cycle_duration_ms(&hack_cycle(), 20, 0);
        assert_eq!(exact, 3640);
        assert!(schedule_at_anchor(hack_cycle(), 10_000 + exact, 10_000, 20, 0).is_ok());
        assert!(schedule_at_anchor(hack_cycle(), 10_000 + exact, 10_000, 20, 1).is_err());
    }

    #[test]
    fn test_scenario_c_pipelined_windows_do_not_overlap() {
        let mut planner = TimingPlanner::new(TimingConfig {
            safety_gap_ms: 20,
            dispatch_latency_ms: 0,
            ..TimingConfig::default()
        });

        let first = planner.schedule("n00dles", hack_cycle(), 4000, 10_000).unwrap();
        let second = planner.schedule("n00dles", hack_cycle(), 4000, 10_000).unwrap();

        let (a_start, a_end) = first.landing_window();
        let (b_start, b_end) = second.landing_window();
        assert!(a_start <= a_end);
        assert!(b_start >= a_end + 20, "second window {}..{} overlaps {}..{}", b_start, b_end, a_start, a_end);
        assert_eq!(planner.landing_end("n00dles"), Some(b_end));

        // Each cycle still lands in order
        for cycle in [&first, &second] {
            let done = completions(cycle);
            assert!(done.windows(2).all(|p| p[1] >= p[0] + 20));
        }
    }

    #[test]
    fn test_fixed_cycle_duration_overrides_minimal() {
        let mut planner = TimingPlanner::new(TimingConfig {
            cycle_duration_ms: Some(2_000),
            ..TimingConfig::default()
        });
        assert_eq!(planner.cycle_duration_ms(&hack_cycle()), 2_000);

        // Too short for a 3600ms weaken: rejected, and the pipeline is untouched
        let err = planner.schedule("n00dles", hack_cycle(), 2_000, 0).unwrap_err();
        assert!(matches!(err, BatchrError::PastDeadline { retry_after_ms: 2_000, .. }));
        assert!(planner.landing_end("n00dles").is_none());
    }

    #[test]
    fn test_pipelines_are_per_target() {
        let mut planner = TimingPlanner::new(TimingConfig::default());
        let a = planner.schedule("n00dles", hack_cycle(), 5000, 0).unwrap();
        let b = planner.schedule("foodnstuff", hack_cycle(), 5000, 0).unwrap();
        assert_eq!(a.last_completion_ms(), b.last_completion_ms());
    }

    #[test]
    fn test_forget_and_prune() {
        let mut planner = TimingPlanner::new(TimingConfig::default());
        planner.schedule("n00dles", hack_cycle(), 5000, 0).unwrap();
        planner.schedule("sigma-cosmetics", hack_cycle(), 5000, 0).unwrap();

        planner.forget("n00dles");
        assert!(planner.landing_end("n00dles").is_none());

        planner.prune(5000);
        assert!(planner.landing_end("sigma-cosmetics").is_none());
    }

    #[test]
    fn test_rewind_only_when_unchanged() {
        let mut planner = TimingPlanner::new(TimingConfig::default());
        let first = planner.schedule("n00dles", hack_cycle(), 5000, 0).unwrap();
        let second = planner.schedule("n00dles", hack_cycle(), 5000, 0).unwrap();

        planner.rewind("n00dles", first.last_completion_ms(), None);
        assert_eq!(planner.landing_end("n00dles"), Some(second.last_completion_ms()));

        planner.rewind("n00dles", second.last_completion_ms(), Some(first.last_completion_ms()));
        assert_eq!(planner.landing_end("n00dles"), Some(first.last_completion_ms()));
    }

    #[test]
    fn test_cycle_duration_includes_padding() {
        let planner = TimingPlanner::new(TimingConfig::default());
        let cycle = hack_cycle();
        assert_eq!(planner.cycle_duration_ms(&cycle), 3600 + 60 + 50 + 200);
    }
}
