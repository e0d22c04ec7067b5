//! Command results and the model-facing tool envelope

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dispatch layer for a classified command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// Handled by a registered Layer-1 handler, never reaches the shell.
    BuiltinVerb,
    /// Pluggable extension handlers: `mcp:*:*`, three-part `skill:<name>:<tool>`.
    Extension,
    /// Everything else: passed to the persistent shell session.
    Native,
}

/// Result of routing one command, whatever layer handled it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Set when a sandbox policy denied the command. The outer Bash tool
    /// surfaces this as a policy signal, not a tool failure.
    #[serde(default)]
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_resource: Option<String>,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn error(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Default::default()
        }
    }

    pub fn blocked(reason: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            blocked: true,
            blocked_reason: Some(reason.into()),
            blocked_resource: Some(resource.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.blocked
    }
}

/// The tagged envelope the outer agent runtime consumes from every tool call.
#[derive(Clone, Debug)]
pub enum ToolReturn {
    Ok {
        output: String,
        extras: Map<String, Value>,
    },
    Err {
        output: String,
        message: String,
        brief: String,
        extras: Map<String, Value>,
    },
}

impl ToolReturn {
    pub fn ok(output: impl Into<String>) -> Self {
        Self::Ok {
            output: output.into(),
            extras: Map::new(),
        }
    }

    pub fn ok_with(output: impl Into<String>, extras: Map<String, Value>) -> Self {
        Self::Ok {
            output: output.into(),
            extras,
        }
    }

    pub fn err(
        output: impl Into<String>,
        message: impl Into<String>,
        brief: impl Into<String>,
    ) -> Self {
        Self::Err {
            output: output.into(),
            message: message.into(),
            brief: brief.into(),
            extras: Map::new(),
        }
    }

    pub fn err_with(
        output: impl Into<String>,
        message: impl Into<String>,
        brief: impl Into<String>,
        extras: Map<String, Value>,
    ) -> Self {
        Self::Err {
            output: output.into(),
            message: message.into(),
            brief: brief.into(),
            extras,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Ok { output, .. } | Self::Err { output, .. } => output,
        }
    }

    pub fn extras(&self) -> &Map<String, Value> {
        match self {
            Self::Ok { extras, .. } | Self::Err { extras, .. } => extras,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { message, .. } => Some(message),
        }
    }
}

/// Which tools a sub-agent type may see at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolInclude {
    /// The full tool surface.
    All,
    /// An explicit list; empty means pure-reasoning mode (no tools).
    List(Vec<String>),
}

/// Per-sub-agent-type tool permissions. Exclude patterns reuse the handler
/// registry convention: a trailing `:` is a prefix match, anything else is
/// an exact match on the base command.
#[derive(Clone, Debug)]
pub struct PermissionSet {
    pub include: ToolInclude,
    pub exclude: Vec<String>,
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            include: ToolInclude::All,
            exclude: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Self {
            include: ToolInclude::List(Vec::new()),
            exclude: Vec::new(),
        }
    }

    pub fn with_exclude(mut self, patterns: &[&str]) -> Self {
        self.exclude = patterns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Pure-reasoning mode: no tools at all.
    pub fn is_empty_include(&self) -> bool {
        matches!(&self.include, ToolInclude::List(list) if list.is_empty())
    }

    /// True when `base` hits an exclude pattern.
    pub fn excludes(&self, base: &str) -> bool {
        self.exclude.iter().any(|pattern| {
            if pattern.ends_with(':') {
                base.starts_with(pattern.as_str())
            } else {
                base == pattern
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_result_blocked() {
        let r = CommandResult::blocked("deny file-read", "~/.ssh/id_rsa");
        assert!(r.blocked);
        assert_ne!(r.exit_code, 0);
        assert!(!r.is_success());
    }

    #[test]
    fn test_tool_return_accessors() {
        let ok = ToolReturn::ok("done");
        assert!(ok.is_ok());
        assert_eq!(ok.output(), "done");
        assert!(ok.message().is_none());

        let err = ToolReturn::err("out", "msg", "brief");
        assert!(!err.is_ok());
        assert_eq!(err.message(), Some("msg"));
    }

    #[test]
    fn test_permissions_exclude_exact_and_prefix() {
        let perms = PermissionSet::all().with_exclude(&["task:", "write"]);
        assert!(perms.excludes("task:explore"));
        assert!(perms.excludes("write"));
        assert!(!perms.excludes("task"));
        assert!(!perms.excludes("read"));
        assert!(!perms.excludes("taskmaster"));
    }

    #[test]
    fn test_permissions_pure_reasoning() {
        assert!(PermissionSet::none().is_empty_include());
        assert!(!PermissionSet::all().is_empty_include());
    }
}
