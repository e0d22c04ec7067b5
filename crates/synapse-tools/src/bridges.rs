//! Extension bridges: the skill store and MCP client seams
//!
//! Both collaborators live outside this repo. The handlers here adapt them
//! into the registry; when no bridge is bound, the lazy factory returns
//! nothing and the router reports a handler-initialization failure.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use synapse_core::CommandResult;
use synapse_router::Handler;

/// The skill store seam. Receives the full normalized command: two-part
/// verbs (`skill:load x`, `skill:list`, `command:search q`) and three-part
/// skill tools (`skill:<name>:<tool> args`).
#[async_trait::async_trait]
pub trait SkillBridge: Send + Sync {
    async fn handle(&self, command: &str) -> CommandResult;

    async fn shutdown(&self) {}
}

/// The MCP client seam for `mcp:<server>:<tool>` commands.
#[async_trait::async_trait]
pub trait McpBridge: Send + Sync {
    async fn handle(&self, command: &str) -> CommandResult;

    async fn shutdown(&self) {}
}

pub struct SkillHandler {
    bridge: Arc<dyn SkillBridge>,
}

impl SkillHandler {
    pub fn new(bridge: Arc<dyn SkillBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait::async_trait]
impl Handler for SkillHandler {
    async fn execute(&self, command: &str, cancel: CancellationToken) -> CommandResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => CommandResult::error("command cancelled", 130),
            result = self.bridge.handle(command) => result,
        }
    }

    async fn shutdown(&self) {
        self.bridge.shutdown().await;
    }
}

pub struct McpHandler {
    bridge: Arc<dyn McpBridge>,
}

impl McpHandler {
    pub fn new(bridge: Arc<dyn McpBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait::async_trait]
impl Handler for McpHandler {
    async fn execute(&self, command: &str, cancel: CancellationToken) -> CommandResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => CommandResult::error("command cancelled", 130),
            result = self.bridge.handle(command) => result,
        }
    }

    async fn shutdown(&self) {
        self.bridge.shutdown().await;
    }
}
