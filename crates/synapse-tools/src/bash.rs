//! The outward-facing Bash tool
//!
//! The single tool the model calls. It validates input, routes the command,
//! shapes the structured result, classifies failures, attaches the
//! self-correction hint, and self-heals the shell after a timeout. Isolated
//! copies give sub-agents their own shell without inheriting the parent's
//! process-level state.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use synapse_core::{
    base_command, events::next_tool_id, failure::help_hint, CommandResult, CoreConfig,
    FailureCategory, NullSink, ProgressEvent, ProgressSink, ToolReturn,
};
use synapse_router::{CommandRouter, HandlerRegistry, SandboxPolicy};
use synapse_shell::ShellSession;

use crate::bridges::{McpBridge, SkillBridge};
use crate::register_builtin_handlers;
use crate::task::TaskRuntimeHandle;

const TIMEOUT_MARKER: &str = "Command execution timeout";
const RESTART_NOTE: &str = "Bash session restarted after timeout.";
const EMPTY_OUTPUT: &str = "(Command executed successfully with no output)";

/// Builds a fresh sandbox manager for a session. Isolated copies use it to
/// get their own sandbox by default instead of sharing the parent's.
pub type SandboxFactory = Arc<dyn Fn(Arc<ShellSession>) -> Arc<dyn SandboxPolicy> + Send + Sync>;

/// Validated input for one `Bash` call.
#[derive(Clone, Debug, Default)]
pub struct BashParams {
    pub command: String,
    pub restart: bool,
}

impl BashParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            restart: false,
        }
    }

    pub fn with_restart(mut self) -> Self {
        self.restart = true;
        self
    }

    pub fn from_json(value: &Value) -> Result<Self, String> {
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| "invalid parameters: 'command' must be a string".to_string())?;
        Ok(Self {
            command: command.to_string(),
            restart: value.get("restart").and_then(Value::as_bool).unwrap_or(false),
        })
    }
}

/// A callable tool surface. The permission filter wraps this, preserving
/// name and schema so a restricted tool is indistinguishable from the
/// unrestricted one.
#[async_trait::async_trait]
pub trait ToolHandle: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn call(&self, params: BashParams, cancel: CancellationToken) -> ToolReturn;
}

/// Everything a Bash tool needs injected. Cloning shares the injected
/// collaborators; the shell session is never part of this and is always
/// constructed fresh.
#[derive(Clone)]
pub struct BashToolDeps {
    pub config: CoreConfig,
    pub workspace_root: PathBuf,
    pub events: Arc<dyn ProgressSink>,
    pub skills: Option<Arc<dyn SkillBridge>>,
    pub mcp: Option<Arc<dyn McpBridge>>,
    pub task_runtime: TaskRuntimeHandle,
    pub sandbox: Option<SandboxFactory>,
    /// Nesting depth reported in tool progress events; isolated copies made
    /// for sub-agents run at depth + 1.
    pub depth: u32,
    pub parent_id: Option<u64>,
}

impl BashToolDeps {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            workspace_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            events: Arc::new(NullSink),
            skills: None,
            mcp: None,
            task_runtime: crate::task::new_task_runtime_handle(),
            sandbox: None,
            depth: 0,
            parent_id: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn ProgressSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_skills(mut self, skills: Arc<dyn SkillBridge>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn with_mcp(mut self, mcp: Arc<dyn McpBridge>) -> Self {
        self.mcp = Some(mcp);
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxFactory) -> Self {
        self.sandbox = Some(sandbox);
        self
    }
}

/// Overrides for `create_isolated_copy`. Everything unset is inherited from
/// the parent; the shell session (and by default the sandbox manager) is
/// always fresh.
#[derive(Default)]
pub struct IsolatedOverrides {
    pub sandbox: Option<SandboxFactory>,
    pub events: Option<Arc<dyn ProgressSink>>,
    pub parent_id: Option<u64>,
}

pub struct BashTool {
    session: Arc<ShellSession>,
    router: Arc<CommandRouter>,
    deps: BashToolDeps,
}

impl BashTool {
    pub fn new(deps: BashToolDeps) -> Arc<Self> {
        let session = Arc::new(ShellSession::new(deps.config.clone()));
        let registry = Arc::new(HandlerRegistry::new());
        let router = Arc::new(CommandRouter::new(
            Arc::clone(&registry),
            Arc::clone(&session),
        ));
        if let Some(factory) = &deps.sandbox {
            router.set_sandbox(Some(factory(Arc::clone(&session))));
        }
        register_builtin_handlers(&registry, &session, &deps, &deps.workspace_root);
        Arc::new(Self {
            session,
            router,
            deps,
        })
    }

    pub fn session(&self) -> &Arc<ShellSession> {
        &self.session
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    /// A fresh Bash tool sharing every injected dependency except the shell
    /// session and, unless overridden, the sandbox manager. This is how
    /// sub-agents get their own shell.
    pub fn create_isolated_copy(&self, overrides: IsolatedOverrides) -> Arc<BashTool> {
        let mut deps = self.deps.clone();
        if let Some(sandbox) = overrides.sandbox {
            deps.sandbox = Some(sandbox);
        }
        if let Some(events) = overrides.events {
            deps.events = events;
        }
        deps.depth = self.deps.depth + 1;
        deps.parent_id = overrides.parent_id.or(self.deps.parent_id);
        BashTool::new(deps)
    }

    /// Late-bind (or swap) the task runtime. Swapping invalidates
    /// factory-built handlers so they reconstruct against the new binding.
    pub async fn set_task_runtime(&self, runtime: Arc<dyn crate::task::TaskRuntime>) {
        *self.deps.task_runtime.write().await = Some(runtime);
        self.router.invalidate_handlers();
    }

    /// Tear down the tool: shut handlers down, kill the shell.
    pub async fn dispose(&self) {
        self.router.registry().shutdown_all().await;
        self.session.cleanup().await;
    }

    async fn call_inner(&self, params: BashParams, cancel: CancellationToken) -> ToolReturn {
        let command = params.command.trim().to_string();

        if command.is_empty() {
            return usage_error(
                "Command must be a non-empty string.",
                "empty command",
            );
        }

        if let Some(example) = tool_name_misuse(&command) {
            return usage_error(&example, "tool name used as command");
        }

        let result = self
            .router
            .route(&command, params.restart, cancel.child_token())
            .await;

        if result.blocked {
            return sandbox_blocked_return(&result);
        }

        let mut output = compose_output(&result);

        if result.stderr.contains(TIMEOUT_MARKER) {
            warn!(command = %base_command(&command), "timeout detected, restarting shell");
            if let Err(e) = self.session.restart().await {
                warn!("best-effort restart failed: {e}");
            }
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(RESTART_NOTE);
        }

        if result.exit_code == 0 {
            return ToolReturn::ok(output);
        }

        let category = FailureCategory::classify(&result.stderr);
        let base = base_command(&command);
        if category.should_attach_self_description() {
            output.push_str(&help_hint(&base));
        }

        let mut extras = Map::new();
        extras.insert("failureCategory".into(), json!(category.as_str()));
        extras.insert("baseCommand".into(), json!(base));
        extras.insert("exitCode".into(), json!(result.exit_code));

        let message = if category.should_attach_self_description() {
            format!(
                "Command failed (exit {}). Next step: run `Bash(command=\"{} --help\")` \
                 to learn usage, then retry with valid arguments.",
                result.exit_code, base
            )
        } else {
            format!("Command failed (exit {}).", result.exit_code)
        };
        let brief = match category {
            FailureCategory::CommandNotFound => "command not found",
            FailureCategory::InvalidUsage => "invalid usage",
            FailureCategory::ExecutionError => "command failed",
        };

        ToolReturn::err_with(output, message, brief, extras)
    }
}

#[async_trait::async_trait]
impl ToolHandle for BashTool {
    fn name(&self) -> &str {
        "Bash"
    }

    fn description(&self) -> &str {
        "Execute a command. Built-in verbs (read, write, edit, glob, TodoWrite, \
         skill:*, task:*) are handled directly; everything else runs in a \
         persistent shell session. Commands must be non-interactive; chain \
         with && or ;."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute (non-empty, non-interactive)"
                },
                "restart": {
                    "type": "boolean",
                    "description": "Kill the current shell and spawn a fresh one first (default false)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn call(&self, params: BashParams, cancel: CancellationToken) -> ToolReturn {
        let id = next_tool_id();
        self.deps.events.emit(ProgressEvent::ToolStart {
            id,
            depth: self.deps.depth,
            parent_id: self.deps.parent_id,
            command: params.command.clone(),
        });
        debug!(id, command = %base_command(&params.command), "bash tool call");

        let result = self.call_inner(params, cancel).await;

        self.deps.events.emit(ProgressEvent::ToolEnd {
            id,
            success: result.is_ok(),
            output: result.output().to_string(),
        });
        result
    }
}

/// Detect the model wrapping the tool name inside the command text, e.g.
/// `Bash(command="ls")` or a lone `Bash`. Returns the corrective message.
fn tool_name_misuse(command: &str) -> Option<String> {
    let rest = command.strip_prefix("Bash")?;
    let misuse = rest.is_empty()
        || rest.starts_with('(')
        || rest.chars().next().is_some_and(char::is_whitespace);
    if !misuse {
        return None;
    }
    Some(
        "The tool name is not part of the command. Pass only the command \
         itself: to run `ls -la`, call Bash(command=\"ls -la\"), not \
         Bash(command=\"Bash(ls -la)\")."
            .to_string(),
    )
}

fn usage_error(message: &str, brief: &str) -> ToolReturn {
    let mut extras = Map::new();
    extras.insert(
        "failureCategory".into(),
        json!(FailureCategory::InvalidUsage.as_str()),
    );
    ToolReturn::err_with(String::new(), message.to_string(), brief.to_string(), extras)
}

fn sandbox_blocked_return(result: &CommandResult) -> ToolReturn {
    let reason = result
        .blocked_reason
        .clone()
        .unwrap_or_else(|| "blocked by sandbox policy".to_string());
    let mut extras = Map::new();
    extras.insert("type".into(), json!("sandbox_blocked"));
    extras.insert("message".into(), json!(reason));
    extras.insert("blockedReason".into(), json!(reason));
    if let Some(resource) = &result.blocked_resource {
        extras.insert("resource".into(), json!(resource));
    }
    ToolReturn::ok_with(String::new(), extras)
}

/// Display output: stdout, a blank line, then `[stderr]` when present. Both
/// empty on success collapses to the canonical no-output string.
fn compose_output(result: &CommandResult) -> String {
    let stdout = result.stdout.trim_end();
    let stderr = result.stderr.trim_end();

    if stdout.is_empty() && stderr.is_empty() {
        return if result.exit_code == 0 {
            EMPTY_OUTPUT.to_string()
        } else {
            String::new()
        };
    }

    let mut out = stdout.to_string();
    if !stderr.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("[stderr]\n");
        out.push_str(stderr);
    }
    out
}
