//! The sub-agent executor: a bounded generate/act loop per task
//!
//! Implements the task runtime the `task:*` handler dispatches into. Each
//! task gets an isolated Bash tool (fresh shell) wrapped in its profile's
//! permission filter, a monotonic id, and its own causally-ordered progress
//! events. The loop ends on a turn with no tool calls, the iteration cap,
//! or cancellation; the isolated shell is torn down on every exit path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use synapse_core::{next_tool_id, ProgressEvent, ProgressSink};
use synapse_llm::{
    AccumulatedToolCall, ContentBlock, LlmMessage, LlmProvider, LlmRequest, LlmStream, LlmTool,
    StreamDelta,
};
use synapse_tools::{
    BashParams, BashTool, IsolatedOverrides, PermissionFilter, TaskError, TaskParams, TaskRuntime,
    ToolHandle,
};

use crate::profiles::{ProfileSet, SubAgentProfile};

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub model: String,
    /// Hard cap on generate/act iterations per task.
    pub max_iterations: usize,
    /// Byte cap applied to each tool result before it enters history.
    pub tool_output_cap: usize,
    pub max_tokens: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_iterations: 25,
            tool_output_cap: 50_000,
            max_tokens: 8192,
        }
    }
}

pub struct SubAgentExecutor {
    provider: Arc<dyn LlmProvider>,
    parent: Arc<BashTool>,
    profiles: ProfileSet,
    events: Arc<dyn ProgressSink>,
    config: ExecutorConfig,
    next_id: AtomicU64,
}

impl SubAgentExecutor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        parent: Arc<BashTool>,
        profiles: ProfileSet,
        events: Arc<dyn ProgressSink>,
        config: ExecutorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            parent,
            profiles,
            events,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Bind this executor into the parent tool's `task:*` handler.
    pub async fn install(self: &Arc<Self>) {
        self.parent
            .set_task_runtime(Arc::clone(self) as Arc<dyn TaskRuntime>)
            .await;
    }

    async fn run(
        &self,
        id: u64,
        profile: &SubAgentProfile,
        params: &TaskParams,
        cancel: CancellationToken,
    ) -> (Result<String, TaskError>, usize) {
        // Pure-reasoning profiles get no tools at all; everyone else gets a
        // fresh isolated Bash tool behind the profile's permission filter.
        let isolated = if profile.permissions.is_empty_include() {
            None
        } else {
            Some(self.parent.create_isolated_copy(IsolatedOverrides {
                parent_id: Some(id),
                ..Default::default()
            }))
        };
        let tool: Option<Arc<dyn ToolHandle>> = isolated.as_ref().map(|bash| {
            Arc::new(PermissionFilter::new(
                Arc::clone(bash) as Arc<dyn ToolHandle>,
                profile.permissions.clone(),
                profile.name.clone(),
            )) as Arc<dyn ToolHandle>
        });

        let result = self
            .run_loop(id, profile, params, tool.as_deref(), &cancel)
            .await;

        if let Some(bash) = isolated {
            bash.dispose().await;
        }
        result
    }

    async fn run_loop(
        &self,
        id: u64,
        profile: &SubAgentProfile,
        params: &TaskParams,
        tool: Option<&dyn ToolHandle>,
        cancel: &CancellationToken,
    ) -> (Result<String, TaskError>, usize) {
        let mut messages = vec![LlmMessage::user(params.prompt.clone())];
        let tool_defs = tool.map(|t| {
            vec![LlmTool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            }]
        });
        let mut tool_count = 0usize;

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return (Err(TaskError::Aborted), tool_count);
            }

            let request = LlmRequest {
                model: self.config.model.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                max_tokens: Some(self.config.max_tokens),
                system: Some(profile.system_prompt.clone()),
            };

            let stream = match self
                .provider
                .complete_stream(request, Some(cancel.child_token()))
                .await
            {
                Ok(stream) => stream,
                Err(synapse_llm::LlmError::Cancelled) => {
                    return (Err(TaskError::Aborted), tool_count)
                }
                Err(e) => return (Err(TaskError::Provider(e.to_string())), tool_count),
            };

            let (text, tool_calls) = match consume_stream(stream, cancel).await {
                Ok(turn) => turn,
                Err(e) => return (Err(e), tool_count),
            };

            let mut blocks = Vec::new();
            if !text.is_empty() {
                blocks.push(ContentBlock::Text { text: text.clone() });
            }
            for call in &tool_calls {
                blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.parse_arguments().unwrap_or_default(),
                });
            }
            if !blocks.is_empty() {
                messages.push(LlmMessage::assistant_blocks(blocks));
            }

            if tool_calls.is_empty() {
                debug!(id, iteration, "sub-agent turn had no tool calls, done");
                return (Ok(text), tool_count);
            }

            let Some(tool) = tool else {
                return (
                    Err(TaskError::Internal(
                        "tool call issued by a tool-less sub-agent".to_string(),
                    )),
                    tool_count,
                );
            };

            let mut result_blocks = Vec::new();
            for call in tool_calls {
                if cancel.is_cancelled() {
                    return (Err(TaskError::Aborted), tool_count);
                }
                let (block, ran) = self
                    .run_tool_call(id, profile, tool, call, cancel)
                    .await;
                if ran {
                    tool_count += 1;
                }
                result_blocks.push(block);
            }
            messages.push(LlmMessage::tool_results(result_blocks));
        }

        warn!(id, cap = self.config.max_iterations, "sub-agent hit iteration cap");
        (Err(TaskError::IterationLimit), tool_count)
    }

    /// Execute one tool intent; returns the history block and whether the
    /// tool actually ran (malformed arguments never reach it).
    async fn run_tool_call(
        &self,
        id: u64,
        profile: &SubAgentProfile,
        tool: &dyn ToolHandle,
        call: AccumulatedToolCall,
        cancel: &CancellationToken,
    ) -> (ContentBlock, bool) {
        let args = call.parse_arguments().unwrap_or_default();
        let params = match BashParams::from_json(&args) {
            Ok(params) => params,
            Err(e) => {
                return (
                    ContentBlock::ToolResult {
                        tool_use_id: call.id,
                        content: e,
                        is_error: Some(true),
                    },
                    false,
                )
            }
        };

        let tool_event_id = next_tool_id();
        self.events.emit(ProgressEvent::SubAgentToolStart {
            sub_agent_id: id,
            sub_agent_type: profile.name.clone(),
            sub_agent_description: profile.description.clone(),
            id: tool_event_id,
            command: params.command.clone(),
        });

        let result = tool.call(params, cancel.child_token()).await;
        let output = truncate_output(result.output(), self.config.tool_output_cap);
        let success = result.is_ok();

        self.events.emit(ProgressEvent::SubAgentToolEnd {
            id: tool_event_id,
            success,
            output: output.clone(),
        });

        (
            ContentBlock::ToolResult {
                tool_use_id: call.id,
                content: output,
                is_error: (!success).then_some(true),
            },
            true,
        )
    }
}

#[async_trait::async_trait]
impl TaskRuntime for SubAgentExecutor {
    async fn run_task(
        &self,
        agent_type: &str,
        params: TaskParams,
        cancel: CancellationToken,
    ) -> Result<String, TaskError> {
        let profile = self
            .profiles
            .get(agent_type)
            .ok_or_else(|| TaskError::UnknownType(agent_type.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        info!(id, %agent_type, description = %params.description, "sub-agent starting");
        self.events.emit(ProgressEvent::SubAgentStart {
            id,
            agent_type: agent_type.to_string(),
            description: params.description.clone(),
        });

        let (result, tool_count) = self.run(id, &profile, &params, cancel).await;

        self.events.emit(ProgressEvent::SubAgentComplete {
            id,
            success: result.is_ok(),
            tool_count,
            duration: start.elapsed(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        info!(id, success = result.is_ok(), tool_count, "sub-agent complete");

        result
    }
}

/// Drain one provider stream into (text, accumulated tool calls).
async fn consume_stream(
    mut stream: LlmStream,
    cancel: &CancellationToken,
) -> Result<(String, Vec<AccumulatedToolCall>), TaskError> {
    let mut text = String::new();
    let mut calls = Vec::new();
    let mut current: Option<AccumulatedToolCall> = None;

    loop {
        let delta = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TaskError::Aborted),
            delta = stream.next() => delta,
        };
        let Some(delta) = delta else { break };

        match delta {
            Ok(StreamDelta::Text(t)) => text.push_str(&t),
            Ok(StreamDelta::Thinking(_)) => {}
            Ok(StreamDelta::ToolCallStart { id, name }) => {
                current = Some(AccumulatedToolCall {
                    id,
                    name,
                    arguments: String::new(),
                });
            }
            Ok(StreamDelta::ToolCallDelta { arguments, .. }) => {
                if let Some(call) = &mut current {
                    call.arguments.push_str(&arguments);
                }
            }
            Ok(StreamDelta::ToolCallEnd { .. }) => {
                if let Some(call) = current.take() {
                    calls.push(call);
                }
            }
            Ok(StreamDelta::Done { .. }) => {}
            Ok(StreamDelta::Error(e)) => return Err(TaskError::Provider(e)),
            Err(synapse_llm::LlmError::Cancelled) => return Err(TaskError::Aborted),
            Err(e) => return Err(TaskError::Provider(e.to_string())),
        }
    }

    Ok((text, calls))
}

/// Cap a tool result at a UTF-8 boundary before it enters history.
fn truncate_output(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... [truncated, {} total bytes]", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_output_short_passthrough() {
        assert_eq!(truncate_output("hello", 100), "hello");
    }

    #[test]
    fn test_truncate_output_caps_and_labels() {
        let long = "x".repeat(200);
        let out = truncate_output(&long, 50);
        assert!(out.starts_with(&"x".repeat(50)));
        assert!(out.contains("[truncated, 200 total bytes]"));
    }

    #[test]
    fn test_truncate_output_respects_utf8_boundary() {
        // Each of these is 3 bytes in UTF-8.
        let s = "あいうえお";
        let out = truncate_output(s, 4);
        assert!(out.starts_with('あ'));
        assert!(!out.starts_with("あい"));
    }
}
