//! The handler trait every dispatch target implements

use synapse_core::CommandResult;
use tokio_util::sync::CancellationToken;

/// One dispatch target. Handlers never propagate errors upward; they
/// convert every failure into a `CommandResult` so the model-facing surface
/// stays total. Cancellation is cooperative through the token.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn execute(&self, command: &str, cancel: CancellationToken) -> CommandResult;

    /// Called once on router shutdown for handlers that hold resources.
    async fn shutdown(&self) {}
}
