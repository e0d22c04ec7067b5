//! Permission filter: the restricted tool wrapper sub-agents see
//!
//! Wraps a tool handle with a per-agent-type permission set. The wrapper
//! preserves the wrapped tool's name and schema, so a restricted tool is
//! indistinguishable from the real one until a blocked command comes back
//! as a policy refusal.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bash::{BashParams, ToolHandle};
use synapse_core::{base_command, FailureCategory, PermissionSet, ToolReturn};

pub struct PermissionFilter {
    inner: Arc<dyn ToolHandle>,
    permissions: PermissionSet,
    agent_type: String,
}

impl PermissionFilter {
    pub fn new(
        inner: Arc<dyn ToolHandle>,
        permissions: PermissionSet,
        agent_type: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            permissions,
            agent_type: agent_type.into(),
        }
    }

    fn refusal(&self, detail: String) -> ToolReturn {
        let mut extras = Map::new();
        extras.insert(
            "failureCategory".into(),
            json!(FailureCategory::InvalidUsage.as_str()),
        );
        extras.insert("agentType".into(), json!(self.agent_type));
        ToolReturn::err_with(detail.clone(), detail, "permission denied", extras)
    }
}

#[async_trait::async_trait]
impl ToolHandle for PermissionFilter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    async fn call(&self, params: BashParams, cancel: CancellationToken) -> ToolReturn {
        if self.permissions.is_empty_include() {
            return self.refusal(format!(
                "No tools are available to the '{}' agent; it reasons over \
                 the conversation only.",
                self.agent_type
            ));
        }

        let base = base_command(&params.command);
        if self.permissions.excludes(&base) {
            debug!(agent_type = %self.agent_type, %base, "command excluded by policy");
            return self.refusal(format!(
                "The '{}' agent is not permitted to run '{}'.",
                self.agent_type, base
            ));
        }

        self.inner.call(params, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTool;

    #[async_trait::async_trait]
    impl ToolHandle for RecordingTool {
        fn name(&self) -> &str {
            "Bash"
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, params: BashParams, _cancel: CancellationToken) -> ToolReturn {
            ToolReturn::ok(format!("ran: {}", params.command))
        }
    }

    fn filter(permissions: PermissionSet) -> PermissionFilter {
        PermissionFilter::new(Arc::new(RecordingTool), permissions, "explore")
    }

    #[tokio::test]
    async fn test_wrapper_preserves_identity() {
        let f = filter(PermissionSet::all());
        assert_eq!(f.name(), "Bash");
        assert_eq!(f.description(), "test tool");
        assert_eq!(f.input_schema(), json!({"type": "object"}));
    }

    #[tokio::test]
    async fn test_empty_include_rejects_everything() {
        let f = filter(PermissionSet::none());
        let out = f
            .call(BashParams::new("echo hi"), CancellationToken::new())
            .await;
        assert!(!out.is_ok());
        assert!(out.message().unwrap().contains("explore"));
    }

    #[tokio::test]
    async fn test_exclude_prefix_blocks_task_commands() {
        let f = filter(PermissionSet::all().with_exclude(&["task:"]));
        let out = f
            .call(
                BashParams::new("task:explore --prompt hi"),
                CancellationToken::new(),
            )
            .await;
        assert!(!out.is_ok());
        let msg = out.message().unwrap();
        assert!(msg.contains("explore"));
        assert!(msg.contains("task:explore"));
    }

    #[tokio::test]
    async fn test_exclude_exact_blocks_verb() {
        let f = filter(PermissionSet::all().with_exclude(&["write"]));
        let out = f
            .call(BashParams::new("write a.txt hi"), CancellationToken::new())
            .await;
        assert!(!out.is_ok());
    }

    #[tokio::test]
    async fn test_non_matching_command_delegates() {
        let f = filter(PermissionSet::all().with_exclude(&["task:", "write"]));
        let out = f
            .call(BashParams::new("echo hi"), CancellationToken::new())
            .await;
        assert!(out.is_ok());
        assert_eq!(out.output(), "ran: echo hi");
    }
}
