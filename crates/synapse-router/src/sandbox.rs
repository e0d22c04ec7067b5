//! Sandbox admission policy for native shell commands
//!
//! The router consults a `SandboxPolicy` before anything reaches the shell.
//! A denial comes back as a `blocked` result the outer Bash tool surfaces
//! as a policy signal, never as a tool failure. The bundled `RuleSandbox`
//! matches command tokens against deny rules, honors an append-only
//! permanent allow-list file, and executes admitted commands on the same
//! persistent shell session the router would use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use globset::{Glob, GlobMatcher};
use tracing::{debug, warn};

use synapse_core::{tokenize, CommandResult, Error};
use synapse_shell::ShellSession;

/// Outcome of one sandbox admission + execution.
#[derive(Clone, Debug)]
pub struct SandboxDecision {
    pub allowed: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub blocked_reason: Option<String>,
    pub blocked_resource: Option<String>,
}

impl SandboxDecision {
    pub fn denied(reason: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            allowed: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 1,
            blocked_reason: Some(reason.into()),
            blocked_resource: Some(resource.into()),
        }
    }

    pub fn executed(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            allowed: true,
            stdout,
            stderr,
            exit_code,
            blocked_reason: None,
            blocked_resource: None,
        }
    }

    pub fn into_result(self) -> CommandResult {
        if self.allowed {
            CommandResult {
                stdout: self.stdout,
                stderr: self.stderr,
                exit_code: self.exit_code,
                ..Default::default()
            }
        } else {
            CommandResult {
                stdout: self.stdout,
                stderr: self.stderr,
                exit_code: self.exit_code.max(1),
                blocked: true,
                blocked_reason: self.blocked_reason,
                blocked_resource: self.blocked_resource,
            }
        }
    }
}

#[async_trait::async_trait]
pub trait SandboxPolicy: Send + Sync {
    async fn execute(&self, command: &str, cwd: &Path) -> SandboxDecision;
}

/// One deny rule: a glob over command tokens plus the reason reported back.
#[derive(Clone, Debug)]
pub struct SandboxRule {
    pub resource: String,
    pub reason: String,
}

impl SandboxRule {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

/// Deny-rule sandbox with a persistent permanent allow-list.
///
/// The allow-list file is append-only; a process-wide cache of its contents
/// is invalidated whenever `allow_permanent` adds a line.
pub struct RuleSandbox {
    session: Arc<ShellSession>,
    rules: Vec<(GlobMatcher, SandboxRule)>,
    allow_file: Option<PathBuf>,
    allow_cache: RwLock<Option<HashSet<String>>>,
}

impl RuleSandbox {
    pub fn new(session: Arc<ShellSession>, rules: Vec<SandboxRule>) -> Self {
        let compiled = rules
            .into_iter()
            .filter_map(|rule| match Glob::new(&rule.resource) {
                Ok(glob) => Some((glob.compile_matcher(), rule)),
                Err(e) => {
                    warn!(resource = %rule.resource, "invalid sandbox rule glob: {e}");
                    None
                }
            })
            .collect();
        Self {
            session,
            rules: compiled,
            allow_file: None,
            allow_cache: RwLock::new(None),
        }
    }

    pub fn with_allow_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.allow_file = Some(path.into());
        self
    }

    /// Permanently allow a resource: append it to the allow-list file and
    /// invalidate the read cache.
    pub fn allow_permanent(&self, resource: &str) -> std::io::Result<()> {
        let Some(path) = &self.allow_file else {
            return Ok(());
        };
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{resource}")?;
        *self.allow_cache.write().unwrap() = None;
        debug!(%resource, "resource permanently allowed");
        Ok(())
    }

    fn allowed_resources(&self) -> HashSet<String> {
        if let Some(cached) = self.allow_cache.read().unwrap().as_ref() {
            return cached.clone();
        }
        let loaded: HashSet<String> = self
            .allow_file
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|content| {
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        *self.allow_cache.write().unwrap() = Some(loaded.clone());
        loaded
    }

    fn deny_match(&self, command: &str) -> Option<(String, String)> {
        let allowed = self.allowed_resources();
        for token in tokenize(command) {
            if allowed.contains(&token) {
                continue;
            }
            for (matcher, rule) in &self.rules {
                if token == rule.resource || matcher.is_match(&token) {
                    return Some((rule.reason.clone(), token));
                }
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl SandboxPolicy for RuleSandbox {
    async fn execute(&self, command: &str, _cwd: &Path) -> SandboxDecision {
        if let Some((reason, resource)) = self.deny_match(command) {
            debug!(%command, %reason, %resource, "sandbox denied command");
            return SandboxDecision::denied(reason, resource);
        }
        match self.session.execute(command).await {
            Ok(out) => SandboxDecision::executed(out.stdout, out.stderr, out.exit_code),
            Err(e) => {
                let exit_code = if e.is_timeout() { 124 } else { 1 };
                SandboxDecision::executed(String::new(), e.to_string(), exit_code)
            }
        }
    }
}

/// Map a shell-session error into a native command result. Timeouts keep
/// the conventional 124 so the outer tool's self-heal path can spot them.
pub(crate) fn shell_error_result(e: Error) -> CommandResult {
    let exit_code = if e.is_timeout() { 124 } else { 1 };
    CommandResult::error(e.to_string(), exit_code)
}
