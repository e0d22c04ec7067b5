//! LLM request and streaming-response types

use serde::{Deserialize, Serialize};

/// One completion request.
#[derive(Clone, Debug, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<LlmTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            messages: Vec::new(),
            tools: None,
            max_tokens: Some(8192),
            system: None,
        }
    }
}

/// Message in a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: LlmContent,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: LlmContent::Text(text.into()),
        }
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: LlmContent::Blocks(blocks),
        }
    }

    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content: LlmContent::Blocks(blocks),
        }
    }
}

/// Message content: plain string or structured blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Content block types.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Tool definition sent to the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Streaming delta from a provider.
#[derive(Clone, Debug)]
pub enum StreamDelta {
    Text(String),
    Thinking(String),
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments: String },
    ToolCallEnd { id: String },
    Done { stop_reason: Option<String> },
    Error(String),
}

/// Repair a history whose assistant `tool_use` blocks have no matching
/// `tool_result` in the following user message. An aborted loop can leave
/// such orphans; the API rejects them, so synthetic cancelled results are
/// spliced in before sending.
pub fn validate_and_heal_messages(messages: &[LlmMessage]) -> Vec<LlmMessage> {
    let mut healed: Vec<LlmMessage> = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let message = &messages[i];
        healed.push(message.clone());

        let orphans = orphaned_tool_uses(message, messages.get(i + 1));
        if orphans.is_empty() {
            i += 1;
            continue;
        }

        let synthetic: Vec<ContentBlock> = orphans
            .into_iter()
            .map(|id| ContentBlock::ToolResult {
                tool_use_id: id,
                content: "[tool call was cancelled before completion]".to_string(),
                is_error: Some(true),
            })
            .collect();

        // Merge into the following tool-result message when there is one;
        // otherwise splice a fresh results message after the assistant turn.
        match messages.get(i + 1) {
            Some(LlmMessage {
                role,
                content: LlmContent::Blocks(next_blocks),
            }) if role == "user" => {
                let mut blocks = synthetic;
                blocks.extend(next_blocks.clone());
                healed.push(LlmMessage::tool_results(blocks));
                i += 2;
            }
            _ => {
                healed.push(LlmMessage::tool_results(synthetic));
                i += 1;
            }
        }
    }

    healed
}

/// Ids of `tool_use` blocks in `message` with no `tool_result` in `next`.
fn orphaned_tool_uses(message: &LlmMessage, next: Option<&LlmMessage>) -> Vec<String> {
    if message.role != "assistant" {
        return Vec::new();
    }
    let LlmContent::Blocks(blocks) = &message.content else {
        return Vec::new();
    };
    let answered: Vec<&str> = next
        .and_then(|next| match &next.content {
            LlmContent::Blocks(next_blocks) => Some(
                next_blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolResult { tool_use_id, .. } => {
                            Some(tool_use_id.as_str())
                        }
                        _ => None,
                    })
                    .collect(),
            ),
            LlmContent::Text(_) => None,
        })
        .unwrap_or_default();

    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, .. } if !answered.contains(&id.as_str()) => {
                Some(id.clone())
            }
            _ => None,
        })
        .collect()
}

/// Tool call accumulated from a stream of deltas.
#[derive(Clone, Debug, Default)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl AccumulatedToolCall {
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulated_tool_call_parses_arguments() {
        let call = AccumulatedToolCall {
            id: "t1".into(),
            name: "Bash".into(),
            arguments: r#"{"command":"pwd"}"#.into(),
        };
        let args = call.parse_arguments().unwrap();
        assert_eq!(args["command"], "pwd");
    }

    #[test]
    fn test_accumulated_tool_call_empty_arguments() {
        let call = AccumulatedToolCall::default();
        assert_eq!(call.parse_arguments().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_content_block_serialization_tags() {
        let block = ContentBlock::ToolUse {
            id: "t1".into(),
            name: "Bash".into(),
            input: serde_json::json!({"command": "ls"}),
        };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v["type"], "tool_use");

        let block = ContentBlock::ToolResult {
            tool_use_id: "t1".into(),
            content: "ok".into(),
            is_error: None,
        };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v["type"], "tool_result");
        assert!(v.get("is_error").is_none());
    }
}
