//! Error types for batchr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while composing, scheduling or dispatching batches
#[derive(Debug, Error)]
pub enum BatchrError {
    /// Target snapshot no longer matches reality (player skill changed mid-flight)
    #[error("Stale state: {0}")]
    StaleState(String),

    /// Composer or tracker cannot fit the requested threads
    #[error("Insufficient capacity: needed {needed} threads, {available} available")]
    InsufficientCapacity { needed: u32, available: u32 },

    /// Scheduler cannot produce start times that are not already in the past
    #[error("Past deadline: earliest start {earliest_start_ms}ms is before {not_before_ms}ms")]
    PastDeadline {
        earliest_start_ms: i64,
        not_before_ms: u64,
        /// Attempted cycle duration; the caller waits this long before retrying
        retry_after_ms: u64,
    },

    /// Remote launch call returned a non-success result
    #[error("Dispatch failed on {agent}: {reason}")]
    DispatchFailure { agent: String, reason: String },

    /// Target needs no work in the requested mode
    #[error("Nothing to do: {0}")]
    NothingToDo(String),

    /// Agent is not registered with the tracker
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Configuration is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BatchrError {
    /// Whether the scheduling loop should back off and retry instead of giving up.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BatchrError::StaleState(_)
                | BatchrError::InsufficientCapacity { .. }
                | BatchrError::PastDeadline { .. }
                | BatchrError::DispatchFailure { .. }
                | BatchrError::NothingToDo(_)
        )
    }

    /// Whether this error means "wait for capacity" rather than "retry now".
    pub fn is_capacity_wait(&self) -> bool {
        matches!(
            self,
            BatchrError::InsufficientCapacity { .. } | BatchrError::PastDeadline { .. }
        )
    }
}

/// Result type alias for batchr operations
pub type Result<T> = std::result::Result<T, BatchrError>;
