//! `bash` wrapper verb: unwrap one level and run on the shell
//!
//! The model sometimes wraps native commands in a `bash` prefix. The
//! wrapper strips one level, re-applies the write-guard to the remainder,
//! and dispatches what survives to the persistent shell session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use synapse_core::{command, CommandResult};
use synapse_router::{Handler, WriteGuard};
use synapse_shell::ShellSession;

pub struct BashWrapperVerb {
    session: Arc<ShellSession>,
    guard: WriteGuard,
}

impl BashWrapperVerb {
    pub fn new(session: Arc<ShellSession>) -> Self {
        Self {
            session,
            guard: WriteGuard::new(),
        }
    }
}

#[async_trait::async_trait]
impl Handler for BashWrapperVerb {
    async fn execute(&self, cmd: &str, cancel: CancellationToken) -> CommandResult {
        // The guard unwraps the `bash` prefix itself, so check the full
        // command first, then strip for execution.
        if let Some(reason) = self.guard.check(cmd) {
            return CommandResult::error(reason, 1);
        }

        let (_, rest) = command::split_command(cmd);
        let rest = rest.trim();
        if rest.is_empty() {
            return CommandResult::error("Usage: bash <command>", 1);
        }
        let inner = match rest.strip_prefix("-c") {
            Some(quoted) => strip_matching_quotes(quoted.trim_start()),
            None => rest,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => CommandResult::error("command cancelled", 130),
            res = self.session.execute(inner) => match res {
                Ok(out) => CommandResult {
                    stdout: out.stdout,
                    stderr: out.stderr,
                    exit_code: out.exit_code,
                    ..Default::default()
                },
                Err(e) => {
                    let exit_code = if e.is_timeout() { 124 } else { 1 };
                    CommandResult::error(e.to_string(), exit_code)
                }
            },
        }
    }
}

fn strip_matching_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
