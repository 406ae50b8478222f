//! ID generation utilities for batchr
//!
//! Provides functions for generating unique identifiers for batches and pipeline events.

use chrono::Utc;
use rand::Rng;

/// Get current wall-clock timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Generate a unique batch ID
///
/// Format: `batch-{target}-{timestamp_ms}-{random_hex}`
/// Example: `batch-n00dles-1738300800123-a1b2`
pub fn generate_batch_id(target: &str) -> String {
    let random: u16 = rand::rng().random();
    format!("batch-{}-{}-{:04x}", target, now_ms(), random)
}

/// Generate a pipeline event ID linking cycles fed into the same target pipeline
///
/// Format: `evt-{timestamp_ms}-{random_hex}`
pub fn generate_event_id() -> String {
    let random: u16 = rand::rng().random();
    format!("evt-{}-{:04x}", now_ms(), random)
}
