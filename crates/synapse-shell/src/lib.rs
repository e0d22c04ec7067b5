//! Synapse shell - the persistent interactive shell session
//!
//! One long-lived child shell per agent. Commands are framed with injected
//! markers, completion is detected from stdout events (never by polling),
//! and the session survives across calls so environment variables and the
//! working directory persist.

pub mod session;

pub use session::{ShellOutput, ShellSession, COMMAND_END_MARKER, EXIT_CODE_MARKER};
