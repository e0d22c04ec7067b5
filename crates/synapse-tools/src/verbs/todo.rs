//! `TodoWrite` verb: the agent's structured todo list

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use synapse_core::{command, CommandResult};
use synapse_router::Handler;

const USAGE: &str =
    "Usage: TodoWrite '[{\"content\":\"...\",\"status\":\"pending|in_progress|completed\"}]'";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[~]",
            Self::Completed => "[x]",
        }
    }
}

#[derive(Default)]
pub struct TodoVerb {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoVerb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Handler for TodoVerb {
    async fn execute(&self, cmd: &str, _cancel: CancellationToken) -> CommandResult {
        let (_, rest) = command::split_command(cmd);
        let raw = rest.trim();
        let raw = strip_outer_quotes(raw);
        if raw.is_empty() {
            return CommandResult::error(USAGE, 1);
        }

        let items: Vec<TodoItem> = match serde_json::from_str(raw) {
            Ok(items) => items,
            Err(e) => {
                return CommandResult::error(
                    format!("invalid parameters: todo list must be a JSON array ({e})"),
                    1,
                )
            }
        };

        debug!("TodoWrite: {} items", items.len());
        let rendered: Vec<String> = items
            .iter()
            .map(|item| format!("{} {}", item.status.marker(), item.content))
            .collect();
        *self.items.lock().unwrap() = items;

        CommandResult::ok(rendered.join("\n"))
    }
}

fn strip_outer_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
