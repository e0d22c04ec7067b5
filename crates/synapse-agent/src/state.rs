//! Per-sub-agent progress bookkeeping
//!
//! The tracker mirrors the event stream into per-sub-agent state a renderer
//! can query: tool counts, a bounded ring of recent tool ids, and buffered
//! events awaiting a flush. State is created on the first event for a new
//! id and destroyed on that id's completion event, so long sessions never
//! accumulate dead entries.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

use synapse_core::{ProgressEvent, ProgressSink};

#[derive(Clone, Debug)]
pub struct ToolCallState {
    pub command: String,
    pub success: Option<bool>,
    pub output: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SubAgentState {
    pub id: u64,
    pub agent_type: String,
    pub description: String,
    pub start_time: Instant,
    pub tool_count: usize,
    pub tool_ids: Vec<u64>,
    /// Bounded ring: only the most recent K tool ids are kept.
    pub recent_tool_ids: VecDeque<u64>,
    pub tool_states: HashMap<u64, ToolCallState>,
    pub pending_progress_events: Vec<ProgressEvent>,
}

impl SubAgentState {
    fn new(id: u64, agent_type: String, description: String) -> Self {
        Self {
            id,
            agent_type,
            description,
            start_time: Instant::now(),
            tool_count: 0,
            tool_ids: Vec::new(),
            recent_tool_ids: VecDeque::new(),
            tool_states: HashMap::new(),
            pending_progress_events: Vec::new(),
        }
    }
}

pub struct SubAgentTracker {
    agents: DashMap<u64, SubAgentState>,
    /// Maps a tool event id back to the sub-agent that issued it.
    tool_owner: DashMap<u64, u64>,
    ring_cap: usize,
}

impl SubAgentTracker {
    pub fn new(ring_cap: usize) -> Self {
        Self {
            agents: DashMap::new(),
            tool_owner: DashMap::new(),
            ring_cap: ring_cap.max(1),
        }
    }

    /// Fold one event into the tracked state.
    pub fn observe(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::SubAgentStart {
                id,
                agent_type,
                description,
            } => {
                self.agents.entry(*id).or_insert_with(|| {
                    SubAgentState::new(*id, agent_type.clone(), description.clone())
                });
                self.buffer(*id, event);
            }
            ProgressEvent::SubAgentToolStart {
                sub_agent_id,
                id,
                command,
                ..
            } => {
                self.tool_owner.insert(*id, *sub_agent_id);
                if let Some(mut state) = self.agents.get_mut(sub_agent_id) {
                    state.tool_count += 1;
                    state.tool_ids.push(*id);
                    state.recent_tool_ids.push_back(*id);
                    while state.recent_tool_ids.len() > self.ring_cap {
                        state.recent_tool_ids.pop_front();
                    }
                    state.tool_states.insert(
                        *id,
                        ToolCallState {
                            command: command.clone(),
                            success: None,
                            output: None,
                        },
                    );
                }
                self.buffer(*sub_agent_id, event);
            }
            ProgressEvent::SubAgentToolEnd {
                id,
                success,
                output,
            } => {
                if let Some(owner) = self.tool_owner.remove(id).map(|(_, owner)| owner) {
                    if let Some(mut state) = self.agents.get_mut(&owner) {
                        if let Some(call) = state.tool_states.get_mut(id) {
                            call.success = Some(*success);
                            call.output = Some(output.clone());
                        }
                    }
                    self.buffer(owner, event);
                }
            }
            ProgressEvent::SubAgentComplete { id, .. } => {
                if let Some((_, state)) = self.agents.remove(id) {
                    for tool_id in &state.tool_ids {
                        self.tool_owner.remove(tool_id);
                    }
                    debug!(
                        id,
                        tool_count = state.tool_count,
                        "sub-agent state destroyed"
                    );
                }
            }
            ProgressEvent::ToolStart { .. } | ProgressEvent::ToolEnd { .. } => {}
        }
    }

    fn buffer(&self, id: u64, event: &ProgressEvent) {
        if let Some(mut state) = self.agents.get_mut(&id) {
            state.pending_progress_events.push(event.clone());
        }
    }

    /// Take the buffered events for a sub-agent, in causal order.
    pub fn drain_pending(&self, id: u64) -> Vec<ProgressEvent> {
        self.agents
            .get_mut(&id)
            .map(|mut state| std::mem::take(&mut state.pending_progress_events))
            .unwrap_or_default()
    }

    pub fn snapshot(&self, id: u64) -> Option<SubAgentState> {
        self.agents.get(&id).map(|state| state.clone())
    }

    pub fn active_count(&self) -> usize {
        self.agents.len()
    }
}

/// A sink that folds events into a tracker, then forwards to the host.
pub struct TrackingSink {
    tracker: Arc<SubAgentTracker>,
    inner: Arc<dyn ProgressSink>,
}

impl TrackingSink {
    pub fn new(tracker: Arc<SubAgentTracker>, inner: Arc<dyn ProgressSink>) -> Self {
        Self { tracker, inner }
    }
}

impl ProgressSink for TrackingSink {
    fn emit(&self, event: ProgressEvent) {
        self.tracker.observe(&event);
        self.inner.emit(event);
    }
}
