//! Synapse LLM - the provider interface the sub-agent loop consumes
//!
//! The core is not an LLM client library; this crate carries the trait, the
//! request/stream-delta types, and one thin Anthropic SSE binding so the
//! nested agent loop is runnable end-to-end.

pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream};
pub use types::*;
