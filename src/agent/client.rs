//! Execution agent client trait

use async_trait::async_trait;

use crate::domain::{OpKind, TargetState};
use crate::error::Result;

/// Remote execution environment the scheduler launches legs into.
///
/// Every call is independent. Launches are fire-and-forget: a leg never reports
/// back, so the returned process id is only kept for correlation.
#[async_trait]
pub trait ExecutionAgentClient: Send + Sync {
    /// Fresh snapshot of a target's money and security
    async fn target_state(&self, hostname: &str) -> Result<TargetState>;

    /// Threads the agent could run right now
    async fn available_threads(&self, agent: &str) -> Result<u32>;

    /// Launch `threads` threads of `op` on `agent` against `target`, sleeping until `start_at_ms`.
    ///
    /// Fails with `DispatchFailure` if the agent refuses the launch.
    async fn dispatch(&self, agent: &str, op: OpKind, threads: u32, target: &str, start_at_ms: u64) -> Result<u64>;

    /// Current player hacking skill
    async fn player_skill(&self) -> Result<u32>;
}
