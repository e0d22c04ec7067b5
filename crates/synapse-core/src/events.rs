//! Progress events emitted toward the host renderer
//!
//! The core never renders. It emits a causal stream of events per tool call
//! and per sub-agent onto a host-provided sink; the consumer handles
//! cross-sub-agent interleaving. Events for a given sub-agent id are emitted
//! in causal order, nothing more is promised.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Process-wide monotonic id for tool progress events. Shared across every
/// tool instance so a renderer never sees colliding ids.
pub fn next_tool_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Debug)]
pub enum ProgressEvent {
    ToolStart {
        id: u64,
        depth: u32,
        parent_id: Option<u64>,
        command: String,
    },
    ToolEnd {
        id: u64,
        success: bool,
        output: String,
    },
    SubAgentStart {
        id: u64,
        agent_type: String,
        description: String,
    },
    SubAgentToolStart {
        sub_agent_id: u64,
        sub_agent_type: String,
        sub_agent_description: String,
        id: u64,
        command: String,
    },
    SubAgentToolEnd {
        id: u64,
        success: bool,
        output: String,
    },
    SubAgentComplete {
        id: u64,
        success: bool,
        tool_count: usize,
        duration: Duration,
        error: Option<String>,
    },
}

impl ProgressEvent {
    /// The sub-agent id this event belongs to, if any.
    pub fn sub_agent_id(&self) -> Option<u64> {
        match self {
            Self::SubAgentStart { id, .. } | Self::SubAgentComplete { id, .. } => Some(*id),
            Self::SubAgentToolStart { sub_agent_id, .. } => Some(*sub_agent_id),
            _ => None,
        }
    }
}

/// Host-provided event sink. Implementations must be cheap and non-blocking;
/// the executor emits from its hot loop.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events onto an unbounded channel; the receiver is the renderer's
/// problem. A closed receiver drops events silently.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}
