//! The three-layer command router

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::HandlerRegistry;
use crate::sandbox::{shell_error_result, SandboxPolicy};
use crate::write_guard::WriteGuard;
use synapse_core::{base_token, normalize, CommandResult, Layer};
use synapse_shell::ShellSession;

/// Classify a command into its dispatch layer. Pure function of the
/// normalized command text and the registry contents.
///
/// `mcp:*:*` and three-part `skill:<name>:<tool>` are extension-shaped even
/// when no handler is bound; two-part `skill:*` verbs are built-ins routed
/// through the skill handler. Everything without a matching entry is native.
pub fn classify(command: &str, registry: &HandlerRegistry) -> Layer {
    let base = base_token(command);
    if base.starts_with("mcp:") {
        return Layer::Extension;
    }
    if base.starts_with("skill:") {
        return if base.matches(':').count() >= 2 {
            Layer::Extension
        } else {
            Layer::BuiltinVerb
        };
    }
    match registry.lookup(command) {
        Some(entry) => entry.layer(),
        None => Layer::Native,
    }
}

pub struct CommandRouter {
    registry: Arc<HandlerRegistry>,
    session: Arc<ShellSession>,
    sandbox: RwLock<Option<Arc<dyn SandboxPolicy>>>,
    guard: WriteGuard,
    cwd: PathBuf,
}

impl CommandRouter {
    pub fn new(registry: Arc<HandlerRegistry>, session: Arc<ShellSession>) -> Self {
        Self {
            registry,
            session,
            sandbox: RwLock::new(None),
            guard: WriteGuard::new(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }

    pub fn set_sandbox(&self, sandbox: Option<Arc<dyn SandboxPolicy>>) {
        *self.sandbox.write().unwrap() = sandbox;
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn session(&self) -> &Arc<ShellSession> {
        &self.session
    }

    /// Invalidate factory-built handlers after a dependency swap so they
    /// are reconstructed against the new binding on next use.
    pub fn invalidate_handlers(&self) {
        self.registry.invalidate_cached();
    }

    /// Route one command. Cancellation is cooperative: the token aborts the
    /// restart race and in-flight handler calls at their next boundary; a
    /// command already written to the shell is not forcibly killed.
    pub async fn route(
        &self,
        raw: &str,
        restart: bool,
        cancel: CancellationToken,
    ) -> CommandResult {
        if restart {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled_result(),
                res = self.session.restart() => {
                    if let Err(e) = res {
                        return CommandResult::error(format!("shell restart failed: {e}"), 1);
                    }
                }
            }
        }

        let command = normalize(raw);
        let layer = classify(&command, &self.registry);
        debug!(command = %base_token(&command), ?layer, "routing command");

        match layer {
            Layer::Native => self.route_native(&command, cancel).await,
            Layer::BuiltinVerb | Layer::Extension => {
                let Some(entry) = self.registry.lookup(&command) else {
                    // Extension-shaped with nothing bound: a not-found the
                    // failure classifier recognizes, not a shell error.
                    return CommandResult::error(
                        format!(
                            "Unknown tool: {} (no handler registered)",
                            base_token(&command)
                        ),
                        1,
                    );
                };
                let handler = match entry.resolve() {
                    Ok(handler) => handler,
                    Err(e) => return CommandResult::error(e.to_string(), 1),
                };
                handler.execute(&command, cancel.child_token()).await
            }
        }
    }

    async fn route_native(&self, command: &str, cancel: CancellationToken) -> CommandResult {
        if let Some(reason) = self.guard.check(command) {
            return CommandResult::error(reason, 1);
        }

        let sandbox = self.sandbox.read().unwrap().clone();
        if let Some(sandbox) = sandbox {
            let decision = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled_result(),
                decision = sandbox.execute(command, &self.cwd) => decision,
            };
            return decision.into_result();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => cancelled_result(),
            res = self.session.execute(command) => match res {
                Ok(out) => CommandResult {
                    stdout: out.stdout,
                    stderr: out.stderr,
                    exit_code: out.exit_code,
                    ..Default::default()
                },
                Err(e) => shell_error_result(e),
            },
        }
    }
}

fn cancelled_result() -> CommandResult {
    CommandResult::error("command cancelled", 130)
}
