//! Synapse core - shared types for the command execution substrate
//!
//! Everything the dispatch layers agree on lives here: the command result
//! and tool envelope types, command-string parsing, the failure taxonomy,
//! environment-driven configuration, and the progress event stream.

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod failure;
pub mod result;

pub use command::{base_command, base_token, normalize, tokenize};
pub use config::CoreConfig;
pub use error::{Error, Result};
pub use events::{next_tool_id, ChannelSink, NullSink, ProgressEvent, ProgressSink};
pub use failure::FailureCategory;
pub use result::{CommandResult, Layer, PermissionSet, ToolInclude, ToolReturn};
