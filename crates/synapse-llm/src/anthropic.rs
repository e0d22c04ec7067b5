//! Anthropic Claude API binding
//!
//! One thin adapter behind the provider trait. The request body is built
//! directly as JSON, and the SSE stream is handled by a small stateful
//! parser that separates frame extraction from event dispatch, so a chunk
//! boundary can fall anywhere inside a frame.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{validate_and_heal_messages, LlmContent, LlmRequest, StreamDelta};
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let body = build_request_body(&request);
        debug!(model = %request.model, "dispatching completion request");

        let send = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let response = match &cancel {
            Some(token) => tokio::select! {
                resp = send => resp?,
                _ = token.cancelled() => return Err(LlmError::Cancelled),
            },
            None => send.await?,
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, %detail, "completion request rejected");
            return Err(status_error(status.as_u16(), detail));
        }

        let bytes_stream = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut parser = SseParser::new();
            tokio::pin!(bytes_stream);

            loop {
                let chunk = match &cancel {
                    Some(token) => tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            yield Err(LlmError::Cancelled);
                            break;
                        }
                        chunk = bytes_stream.next() => chunk,
                    },
                    None => bytes_stream.next().await,
                };
                let Some(chunk) = chunk else { break };

                match chunk {
                    Ok(bytes) => {
                        for item in parser.push(&bytes) {
                            yield item;
                        }
                    }
                    Err(e) => yield Err(LlmError::StreamError(e.to_string())),
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Assemble the Messages API body, healing any orphaned tool_use blocks
/// first.
fn build_request_body(request: &LlmRequest) -> Value {
    let messages: Vec<Value> = validate_and_heal_messages(&request.messages)
        .iter()
        .map(|m| {
            let content = match &m.content {
                LlmContent::Text(text) => json!(text),
                LlmContent::Blocks(blocks) => serde_json::to_value(blocks).unwrap_or_default(),
            };
            json!({"role": m.role, "content": content})
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens.unwrap_or(8192),
        "stream": true,
    });
    if let Some(system) = &request.system {
        body["system"] = json!(system);
    }
    if let Some(tools) = &request.tools {
        body["tools"] = Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect(),
        );
    }
    body
}

fn status_error(status: u16, detail: String) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthFailed(detail),
        429 => LlmError::RateLimited {
            retry_after_ms: 60_000,
        },
        _ => LlmError::RequestFailed(format!("HTTP {status}: {detail}")),
    }
}

/// Incremental SSE parser. Bytes go in, complete frames come out as
/// stream deltas; partial frames wait in the buffer for the next chunk.
struct SseParser {
    buffer: String,
    /// Id of the tool_use block currently streaming its input json.
    open_tool: Option<String>,
}

impl SseParser {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            open_tool: None,
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<LlmResult<StreamDelta>> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut out = Vec::new();
        while let Some((event, data)) = self.take_frame() {
            out.extend(self.dispatch(&event, &data));
        }
        out
    }

    /// Pop one complete `event:`/`data:` frame off the buffer. Frames are
    /// separated by a blank line.
    fn take_frame(&mut self) -> Option<(String, String)> {
        let end = self.buffer.find("\n\n")?;
        let frame: String = self.buffer.drain(..end + 2).collect();

        let mut event = String::new();
        let mut data = String::new();
        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data = rest.trim_start().to_string();
            }
        }
        Some((event, data))
    }

    fn dispatch(&mut self, event: &str, data: &str) -> Vec<LlmResult<StreamDelta>> {
        let Ok(v) = serde_json::from_str::<Value>(data) else {
            return Vec::new();
        };

        match event {
            "content_block_start" => {
                let block = &v["content_block"];
                if block["type"] == "tool_use" {
                    if let (Some(id), Some(name)) = (block["id"].as_str(), block["name"].as_str())
                    {
                        self.open_tool = Some(id.to_string());
                        return vec![Ok(StreamDelta::ToolCallStart {
                            id: id.to_string(),
                            name: name.to_string(),
                        })];
                    }
                }
                Vec::new()
            }
            "content_block_delta" => {
                let delta = &v["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => text_field(delta, "text").map(StreamDelta::Text),
                    Some("thinking_delta") => {
                        text_field(delta, "thinking").map(StreamDelta::Thinking)
                    }
                    Some("input_json_delta") => {
                        match (self.open_tool.clone(), text_field(delta, "partial_json")) {
                            (Some(id), Some(arguments)) => {
                                Some(StreamDelta::ToolCallDelta { id, arguments })
                            }
                            _ => None,
                        }
                    }
                    _ => None,
                }
                .map(Ok)
                .into_iter()
                .collect()
            }
            "content_block_stop" => self
                .open_tool
                .take()
                .map(|id| Ok(StreamDelta::ToolCallEnd { id }))
                .into_iter()
                .collect(),
            "message_stop" => vec![Ok(StreamDelta::Done {
                stop_reason: Some("end_turn".to_string()),
            })],
            "error" => {
                let message = v["error"]["message"]
                    .as_str()
                    .unwrap_or("unspecified stream error")
                    .to_string();
                vec![Err(LlmError::StreamError(message))]
            }
            // ping, message_start, message_delta: nothing to surface.
            _ => Vec::new(),
        }
    }
}

fn text_field(v: &Value, key: &str) -> Option<String> {
    v[key].as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> String {
        format!("event: {event}\ndata: {data}\n\n")
    }

    #[test]
    fn test_request_body_shape() {
        let request = LlmRequest {
            model: "m".into(),
            messages: vec![crate::types::LlmMessage::user("hi")],
            tools: None,
            max_tokens: Some(100),
            system: Some("be brief".into()),
        };
        let body = build_request_body(&request);
        assert_eq!(body["model"], "m");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["system"], "be brief");
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_parser_handles_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        let full = frame(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"text_delta","text":"hel"}}"#,
        );
        let (a, b) = full.split_at(25);

        assert!(parser.push(a.as_bytes()).is_empty());
        let out = parser.push(b.as_bytes());
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0].as_ref().unwrap(),
            StreamDelta::Text(t) if t == "hel"
        ));
    }

    #[test]
    fn test_parser_tool_call_sequence() {
        let mut parser = SseParser::new();
        let mut input = String::new();
        input.push_str(&frame(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"tool_use","id":"t1","name":"Bash"}}"#,
        ));
        input.push_str(&frame(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{\"command\":\"ls\"}"}}"#,
        ));
        input.push_str(&frame("content_block_stop", r#"{"index":0}"#));
        input.push_str(&frame("message_stop", "{}"));

        let out: Vec<StreamDelta> = parser
            .push(input.as_bytes())
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert!(matches!(&out[0], StreamDelta::ToolCallStart { id, name } if id == "t1" && name == "Bash"));
        assert!(matches!(&out[1], StreamDelta::ToolCallDelta { id, .. } if id == "t1"));
        assert!(matches!(&out[2], StreamDelta::ToolCallEnd { id } if id == "t1"));
        assert!(matches!(&out[3], StreamDelta::Done { .. }));
    }

    #[test]
    fn test_parser_error_event() {
        let mut parser = SseParser::new();
        let out = parser.push(
            frame("error", r#"{"error":{"type":"overloaded","message":"busy"}}"#).as_bytes(),
        );
        assert!(matches!(&out[0], Err(LlmError::StreamError(m)) if m == "busy"));
    }

    #[test]
    fn test_parser_ignores_ping_and_unknown_events() {
        let mut parser = SseParser::new();
        let mut input = frame("ping", "{}");
        input.push_str(&frame("message_start", r#"{"message":{}}"#));
        assert!(parser.push(input.as_bytes()).is_empty());
    }
}
