//! Synapse agent - the sub-agent executor behind `task:*`
//!
//! A `task:<type>` command spawns a bounded nested agent loop over an
//! isolated tool view: a fresh Bash tool (own shell session) wrapped in the
//! type's permission filter. The executor emits progress events, honors
//! hierarchical cancellation, and runs any number of sub-agents in
//! parallel, each with its own id and event stream.

pub mod executor;
pub mod profiles;
pub mod state;

pub use executor::{ExecutorConfig, SubAgentExecutor};
pub use profiles::{ProfileSet, SubAgentProfile};
pub use state::{SubAgentState, SubAgentTracker, ToolCallState, TrackingSink};
