//! Agent-side drift check.
//!
//! A launched leg sleeps until its planned start and then compares the clock with
//! the plan. If it woke too late (or too early) its landing order can no longer be
//! trusted, so it exits without touching the target. The scheduler never recalls
//! legs; this check is the only cancellation there is.

/// Returns true if a leg that actually starts at `actual_start_ms` may still run
pub fn within_drift(planned_start_ms: u64, actual_start_ms: u64, tolerance_ms: u64) -> bool {
    planned_start_ms.abs_diff(actual_start_ms) <= tolerance_ms
}
