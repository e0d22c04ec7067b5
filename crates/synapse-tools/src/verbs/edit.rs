//! `edit` verb: exact-string find and replace

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::resolve_path;
use synapse_core::{command, CommandResult};
use synapse_router::Handler;

const USAGE: &str = "Usage: edit <path> \"<old_string>\" \"<new_string>\" [--all]";

pub struct EditVerb {
    workspace_root: PathBuf,
}

impl EditVerb {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Handler for EditVerb {
    async fn execute(&self, cmd: &str, _cancel: CancellationToken) -> CommandResult {
        let (_, rest) = command::split_command(cmd);
        let tokens = command::tokenize(rest);
        if tokens.len() < 3 {
            return CommandResult::error(USAGE, 1);
        }
        let path = &tokens[0];
        let old = &tokens[1];
        let new = &tokens[2];
        let replace_all = tokens.iter().any(|t| t == "--all");

        if old.is_empty() {
            return CommandResult::error(USAGE, 1);
        }

        let full_path = resolve_path(&self.workspace_root, path);
        let content = match fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return CommandResult::error(format!("cannot read {path}: {e}"), 1),
        };

        let positions: Vec<usize> = content.match_indices(old.as_str()).map(|(i, _)| i).collect();
        match positions.len() {
            0 => {
                return CommandResult::error(
                    format!("the target string does not appear in {path}"),
                    1,
                )
            }
            n if n > 1 && !replace_all => {
                return CommandResult::error(
                    format!(
                        "the target string appears {n} times in {path}; add --all \
                         to replace every occurrence, or give a longer unique string"
                    ),
                    1,
                )
            }
            _ => {}
        }

        // Splice the replacements span by span rather than rewriting the
        // whole string per occurrence.
        let limit = if replace_all { positions.len() } else { 1 };
        let mut edited = String::with_capacity(content.len());
        let mut cursor = 0;
        for &pos in positions.iter().take(limit) {
            edited.push_str(&content[cursor..pos]);
            edited.push_str(new);
            cursor = pos + old.len();
        }
        edited.push_str(&content[cursor..]);

        if let Err(e) = fs::write(&full_path, &edited).await {
            return CommandResult::error(format!("cannot write {path}: {e}"), 1);
        }

        debug!(%path, replaced = limit, "edit verb");
        let summary = if limit == 1 {
            format!("Replaced 1 occurrence in {path}")
        } else {
            format!("Replaced {limit} occurrences in {path}")
        };
        CommandResult::ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_edit_replaces_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let verb = EditVerb::new(dir.path());

        let result = verb
            .execute(r#"edit a.txt "world" "rust""#, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "Replaced 1 occurrence in a.txt");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "hello rust"
        );
    }

    #[tokio::test]
    async fn test_edit_rejects_ambiguous_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "aaa bbb aaa").unwrap();
        let verb = EditVerb::new(dir.path());

        let result = verb
            .execute(r#"edit a.txt "aaa" "ccc""#, CancellationToken::new())
            .await;
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("appears 2 times"));
        assert!(result.stderr.contains("--all"));
    }

    #[tokio::test]
    async fn test_edit_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "aaa bbb aaa").unwrap();
        let verb = EditVerb::new(dir.path());

        let result = verb
            .execute(r#"edit a.txt "aaa" "ccc" --all"#, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "Replaced 2 occurrences in a.txt");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "ccc bbb ccc"
        );
    }

    #[tokio::test]
    async fn test_edit_replacement_longer_than_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x-x-x").unwrap();
        let verb = EditVerb::new(dir.path());

        verb.execute(r#"edit a.txt "x" "yyy" --all"#, CancellationToken::new())
            .await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "yyy-yyy-yyy"
        );
    }

    #[tokio::test]
    async fn test_edit_target_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let verb = EditVerb::new(dir.path());

        let result = verb
            .execute(r#"edit a.txt "nope" "x""#, CancellationToken::new())
            .await;
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("does not appear"));
    }

    #[tokio::test]
    async fn test_edit_too_few_arguments_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let verb = EditVerb::new(dir.path());
        let result = verb
            .execute(r#"edit a.txt "old""#, CancellationToken::new())
            .await;
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("Usage:"));
    }
}
