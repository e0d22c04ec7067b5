//! The task handler: `task:*` commands dispatch into the sub-agent runtime
//!
//! The runtime is late-bound through a shared handle, breaking the cycle
//! between the tool layer (which registers the handler) and the agent layer
//! (which implements the runtime). Until the handle is filled, task
//! commands fail with an initialization error.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use synapse_core::{base_token, command, CommandResult};
use synapse_router::Handler;

/// Parameters parsed out of a `task:<type> --prompt "…" --description "…"`
/// command.
#[derive(Clone, Debug)]
pub struct TaskParams {
    pub prompt: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("unknown command: task:{0} (no such sub-agent type)")]
    UnknownType(String),

    #[error("sub-agent aborted")]
    Aborted,

    #[error("sub-agent stopped: iteration limit")]
    IterationLimit,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("{0}")]
    Internal(String),
}

/// Implemented by the sub-agent executor. Returns the sub-agent's final
/// text on success.
#[async_trait::async_trait]
pub trait TaskRuntime: Send + Sync {
    async fn run_task(
        &self,
        agent_type: &str,
        params: TaskParams,
        cancel: CancellationToken,
    ) -> Result<String, TaskError>;
}

/// Late-binding slot for the runtime, filled after construction.
pub type TaskRuntimeHandle = Arc<RwLock<Option<Arc<dyn TaskRuntime>>>>;

pub fn new_task_runtime_handle() -> TaskRuntimeHandle {
    Arc::new(RwLock::new(None))
}

pub struct TaskHandler {
    runtime: TaskRuntimeHandle,
}

impl TaskHandler {
    pub fn new(runtime: TaskRuntimeHandle) -> Self {
        Self { runtime }
    }

    fn parse(command: &str) -> Result<(String, TaskParams), String> {
        let (base, rest) = command::split_command(command);
        let agent_type = base
            .strip_prefix("task:")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| usage())?
            .to_string();

        let tokens = command::tokenize(rest);
        let prompt = command::flag_value(&tokens, "--prompt")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(usage)?
            .to_string();
        let description = command::flag_value(&tokens, "--description")
            .map(str::to_string)
            .unwrap_or_else(|| {
                let mut d = prompt.clone();
                if d.len() > 60 {
                    d.truncate(57);
                    d.push_str("...");
                }
                d
            });

        Ok((agent_type, TaskParams { prompt, description }))
    }
}

fn usage() -> String {
    "Usage: task:<type> --prompt \"<task prompt>\" [--description \"<short label>\"]".to_string()
}

#[async_trait::async_trait]
impl Handler for TaskHandler {
    async fn execute(&self, command: &str, cancel: CancellationToken) -> CommandResult {
        let (agent_type, params) = match Self::parse(command) {
            Ok(parsed) => parsed,
            Err(message) => return CommandResult::error(message, 1),
        };

        let runtime = self.runtime.read().await.clone();
        let Some(runtime) = runtime else {
            return CommandResult::error(
                format!("failed to initialize handler for '{}'", base_token(command)),
                1,
            );
        };

        info!(%agent_type, description = %params.description, "dispatching sub-agent task");

        match runtime.run_task(&agent_type, params, cancel).await {
            Ok(text) => CommandResult::ok(text),
            Err(TaskError::Aborted) => CommandResult::error(TaskError::Aborted.to_string(), 130),
            Err(e) => CommandResult::error(e.to_string(), 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command() {
        let (agent_type, params) = TaskHandler::parse(
            r#"task:explore --prompt "find the bug" --description "bug hunt""#,
        )
        .unwrap();
        assert_eq!(agent_type, "explore");
        assert_eq!(params.prompt, "find the bug");
        assert_eq!(params.description, "bug hunt");
    }

    #[test]
    fn test_parse_defaults_description_to_prompt() {
        let (_, params) = TaskHandler::parse(r#"task:explore --prompt "scan""#).unwrap();
        assert_eq!(params.description, "scan");
    }

    #[test]
    fn test_parse_missing_prompt_is_usage_error() {
        let err = TaskHandler::parse("task:explore").unwrap_err();
        assert!(err.contains("Usage:"));
    }

    #[test]
    fn test_parse_missing_type_is_usage_error() {
        assert!(TaskHandler::parse("task: --prompt hi").is_err());
    }

    #[tokio::test]
    async fn test_unbound_runtime_is_init_failure() {
        let handler = TaskHandler::new(new_task_runtime_handle());
        let result = handler
            .execute("task:explore --prompt hi", CancellationToken::new())
            .await;
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("failed to initialize handler"));
    }

    struct FakeRuntime;

    #[async_trait::async_trait]
    impl TaskRuntime for FakeRuntime {
        async fn run_task(
            &self,
            agent_type: &str,
            params: TaskParams,
            cancel: CancellationToken,
        ) -> Result<String, TaskError> {
            if cancel.is_cancelled() {
                return Err(TaskError::Aborted);
            }
            Ok(format!("{agent_type}: {}", params.prompt))
        }
    }

    #[tokio::test]
    async fn test_bound_runtime_runs() {
        let handle = new_task_runtime_handle();
        *handle.write().await = Some(Arc::new(FakeRuntime));
        let handler = TaskHandler::new(handle);

        let result = handler
            .execute(r#"task:explore --prompt "go""#, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "explore: go");
    }

    #[tokio::test]
    async fn test_abort_surfaces_130() {
        let handle = new_task_runtime_handle();
        *handle.write().await = Some(Arc::new(FakeRuntime));
        let handler = TaskHandler::new(handle);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = handler
            .execute(r#"task:explore --prompt "go""#, cancel)
            .await;
        assert_eq!(result.exit_code, 130);
    }
}
