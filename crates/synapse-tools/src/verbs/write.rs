//! `write` verb: create or overwrite a file

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::resolve_path;
use synapse_core::{command, CommandResult};
use synapse_router::Handler;

const USAGE: &str = "Usage: write <path> \"<content>\"";

pub struct WriteVerb {
    workspace_root: PathBuf,
}

impl WriteVerb {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Handler for WriteVerb {
    async fn execute(&self, cmd: &str, _cancel: CancellationToken) -> CommandResult {
        let (_, rest) = command::split_command(cmd);
        let tokens = command::tokenize(rest);
        if tokens.len() < 2 {
            return CommandResult::error(USAGE, 1);
        }
        let path = &tokens[0];
        let content = tokens[1..].join(" ");

        let full_path = resolve_path(&self.workspace_root, path);
        match full_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if let Err(e) = fs::create_dir_all(parent).await {
                    return CommandResult::error(
                        format!("cannot create parent directory for {path}: {e}"),
                        1,
                    );
                }
            }
            _ => {}
        }

        let existed = fs::metadata(&full_path).await.is_ok();
        if let Err(e) = fs::write(&full_path, &content).await {
            return CommandResult::error(format!("cannot write {path}: {e}"), 1);
        }

        debug!(%path, bytes = content.len(), existed, "write verb");
        let action = if existed { "Overwrote" } else { "Created" };
        CommandResult::ok(format!("{action} {path} ({} bytes)", content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let verb = WriteVerb::new(dir.path());

        let result = verb
            .execute(r#"write nested/dir/a.txt "hello there""#, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.starts_with("Created"));
        let content = std::fs::read_to_string(dir.path().join("nested/dir/a.txt")).unwrap();
        assert_eq!(content, "hello there");
    }

    #[tokio::test]
    async fn test_write_overwrites_and_says_so() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let verb = WriteVerb::new(dir.path());

        let result = verb
            .execute(r#"write a.txt "new""#, CancellationToken::new())
            .await;
        assert!(result.stdout.starts_with("Overwrote"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_write_missing_content_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let verb = WriteVerb::new(dir.path());
        let result = verb.execute("write a.txt", CancellationToken::new()).await;
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("Usage:"));
    }
}
