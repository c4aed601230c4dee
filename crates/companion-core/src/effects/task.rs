//! Cooperative cancellation for lifecycle-scoped work.

use async_trait::async_trait;

/// Signal that the work holding it should wind down.
///
/// Long-running service loops poll `is_cancelled` between units of work or
/// race `cancelled` against their next await, then return.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Completes once cancellation has been requested.
    async fn cancelled(&self);

    /// Whether cancellation has been requested, without waiting.
    fn is_cancelled(&self) -> bool {
        false
    }
}
