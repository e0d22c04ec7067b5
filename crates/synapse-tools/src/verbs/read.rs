//! `read` verb: file contents with optional offset/limit

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::resolve_path;
use synapse_core::{command, CommandResult};
use synapse_router::Handler;

const DEFAULT_LIMIT: usize = 2000;
const USAGE: &str = "Usage: read <path> [--offset N] [--limit N]";

pub struct ReadVerb {
    workspace_root: PathBuf,
}

impl ReadVerb {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Handler for ReadVerb {
    async fn execute(&self, cmd: &str, _cancel: CancellationToken) -> CommandResult {
        let (_, rest) = command::split_command(cmd);
        let tokens = command::tokenize(rest);
        let Some(path) = tokens.first().filter(|t| !t.starts_with("--")) else {
            return CommandResult::error(USAGE, 1);
        };

        let offset = match parse_flag(&tokens, "--offset") {
            Ok(v) => v.unwrap_or(1).max(1),
            Err(e) => return CommandResult::error(e, 1),
        };
        let limit = match parse_flag(&tokens, "--limit") {
            Ok(v) => v.unwrap_or(DEFAULT_LIMIT),
            Err(e) => return CommandResult::error(e, 1),
        };

        let resolved = resolve_path(&self.workspace_root, path);
        let content = match fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => {
                return CommandResult::error(format!("cannot read {path}: {e}"), 1)
            }
        };

        let total = content.lines().count();
        let mut shown = 0usize;
        let mut body = String::new();
        for (n, line) in content.lines().enumerate().skip(offset - 1).take(limit) {
            body.push_str(&format!("{:5} | {}\n", n + 1, line));
            shown += 1;
        }
        let last = offset - 1 + shown;
        if last < total {
            body.push_str(&format!(
                "({} of {} lines; continue with --offset {})",
                shown,
                total,
                last + 1
            ));
        } else {
            body.truncate(body.trim_end_matches('\n').len());
        }

        debug!(%path, shown, total, "read verb");
        CommandResult::ok(body)
    }
}

fn parse_flag(tokens: &[String], flag: &str) -> Result<Option<usize>, String> {
    match command::flag_value(tokens, flag) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("{flag} requires a number argument, got '{raw}'")),
    }
}
