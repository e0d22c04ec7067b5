//! `glob` verb: find workspace files matching a pattern

use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::resolve_path;
use synapse_core::{command, CommandResult};
use synapse_router::Handler;

const USAGE: &str = "Usage: glob <pattern> [--dir <path>]";

/// Directories that are never descended into. Hidden entries are skipped
/// separately.
const SKIP_DIRS: &[&str] = &["target", "node_modules", "vendor"];

/// Listing cap; anything beyond it is summarized in a trailer line.
const LIST_LIMIT: usize = 500;

pub struct GlobVerb {
    workspace_root: PathBuf,
}

impl GlobVerb {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

fn descend_into(entry: &DirEntry) -> bool {
    // The walk root itself is exempt; the search directory may legitimately
    // be hidden (or named like a build directory).
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    !(entry.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()))
}

#[async_trait::async_trait]
impl Handler for GlobVerb {
    async fn execute(&self, cmd: &str, _cancel: CancellationToken) -> CommandResult {
        let (_, rest) = command::split_command(cmd);
        let tokens = command::tokenize(rest);
        let Some(pattern) = tokens.first().filter(|t| !t.starts_with("--")) else {
            return CommandResult::error(USAGE, 1);
        };

        let search_root = command::flag_value(&tokens, "--dir")
            .map(|d| resolve_path(&self.workspace_root, d))
            .unwrap_or_else(|| self.workspace_root.clone());

        let matcher = match GlobBuilder::new(pattern).literal_separator(false).build() {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => return CommandResult::error(format!("Invalid glob pattern: {e}"), 1),
        };

        // Collect workspace-relative paths so the listing is stable across
        // machines, then sort them lexicographically.
        let mut matched: Vec<String> = WalkDir::new(&search_root)
            .into_iter()
            .filter_entry(descend_into)
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&search_root).unwrap_or(e.path());
                matcher
                    .is_match(rel)
                    .then(|| rel.to_string_lossy().into_owned())
            })
            .collect();
        matched.sort();

        debug!(pattern = %pattern, count = matched.len(), "glob verb");

        if matched.is_empty() {
            return CommandResult::ok("(no matches)");
        }

        let total = matched.len();
        let mut listing = matched;
        if total > LIST_LIMIT {
            listing.truncate(LIST_LIMIT);
            listing.push(format!("(and {} more)", total - LIST_LIMIT));
        }
        CommandResult::ok(listing.join("\n"))
    }
}
