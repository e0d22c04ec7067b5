//! Synapse tools - the outward Bash tool and its Layer-1 handlers
//!
//! One tool named `Bash` faces the model. Behind it: the command router,
//! the built-in verb handlers (read/write/edit/glob/TodoWrite plus the
//! `bash` wrapper), the skill/MCP extension bridges, the `task:*` handler
//! with its late-bound runtime, and the permission filter sub-agents are
//! wrapped in.

pub mod bash;
pub mod bridges;
pub mod permission;
pub mod task;
pub mod verbs;

pub use bash::{BashParams, BashTool, BashToolDeps, IsolatedOverrides, SandboxFactory, ToolHandle};
pub use bridges::{McpBridge, McpHandler, SkillBridge, SkillHandler};
pub use permission::PermissionFilter;
pub use task::{new_task_runtime_handle, TaskError, TaskHandler, TaskParams, TaskRuntime, TaskRuntimeHandle};

use std::path::Path;
use std::sync::Arc;

use synapse_core::Layer;
use synapse_router::{Handler, HandlerRegistry, MatchMode};
use synapse_shell::ShellSession;

/// Wire the fixed built-in verb set and the extension factories into a
/// registry. Bridge handlers are built lazily on first matching lookup;
/// an unbound bridge registers nothing, so its commands come back as
/// handler-not-found.
pub fn register_builtin_handlers(
    registry: &HandlerRegistry,
    session: &Arc<ShellSession>,
    deps: &BashToolDeps,
    workspace_root: &Path,
) {
    use verbs::{edit::EditVerb, glob::GlobVerb, read::ReadVerb, todo::TodoVerb, wrapper::BashWrapperVerb, write::WriteVerb};

    registry.register(
        "read",
        Layer::BuiltinVerb,
        MatchMode::Exact,
        Arc::new(ReadVerb::new(workspace_root)),
    );
    registry.register(
        "write",
        Layer::BuiltinVerb,
        MatchMode::Exact,
        Arc::new(WriteVerb::new(workspace_root)),
    );
    registry.register(
        "edit",
        Layer::BuiltinVerb,
        MatchMode::Exact,
        Arc::new(EditVerb::new(workspace_root)),
    );
    registry.register(
        "glob",
        Layer::BuiltinVerb,
        MatchMode::Exact,
        Arc::new(GlobVerb::new(workspace_root)),
    );
    registry.register(
        "TodoWrite",
        Layer::BuiltinVerb,
        MatchMode::Exact,
        Arc::new(TodoVerb::new()),
    );
    registry.register(
        "bash",
        Layer::BuiltinVerb,
        MatchMode::Exact,
        Arc::new(BashWrapperVerb::new(Arc::clone(session))),
    );

    // Skill verbs (two-part) and skill tools (three-part) both route through
    // the skill bridge; `command:search` is backed by the same index. With
    // no bridge bound, nothing is registered and extension-shaped commands
    // come back as handler-not-found.
    if let Some(skills) = &deps.skills {
        let bridge = Arc::clone(skills);
        registry.register_factory(
            "skill:",
            Layer::BuiltinVerb,
            MatchMode::Prefix,
            Arc::new(move || {
                Some(Arc::new(SkillHandler::new(Arc::clone(&bridge))) as Arc<dyn Handler>)
            }),
        );
        let bridge = Arc::clone(skills);
        registry.register_factory(
            "command:search",
            Layer::BuiltinVerb,
            MatchMode::Exact,
            Arc::new(move || {
                Some(Arc::new(SkillHandler::new(Arc::clone(&bridge))) as Arc<dyn Handler>)
            }),
        );
    }

    if let Some(mcp) = &deps.mcp {
        let bridge = Arc::clone(mcp);
        registry.register_factory(
            "mcp:",
            Layer::Extension,
            MatchMode::Prefix,
            Arc::new(move || {
                Some(Arc::new(McpHandler::new(Arc::clone(&bridge))) as Arc<dyn Handler>)
            }),
        );
    }

    let runtime = Arc::clone(&deps.task_runtime);
    registry.register_factory(
        "task:",
        Layer::BuiltinVerb,
        MatchMode::Prefix,
        Arc::new(move || {
            Some(Arc::new(TaskHandler::new(Arc::clone(&runtime))) as Arc<dyn Handler>)
        }),
    );
}
