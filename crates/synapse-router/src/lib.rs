//! Synapse router - the three-layer command dispatcher
//!
//! Every model-issued command is classified as a built-in verb, an extension
//! tool, or a native shell command, then dispatched through a pluggable
//! handler registry or to the persistent shell. Native commands pass a
//! write-guard and, when configured, a sandbox admission check first.

pub mod handler;
pub mod registry;
pub mod router;
pub mod sandbox;
pub mod write_guard;

pub use handler::Handler;
pub use registry::{HandlerFactory, HandlerRegistry, MatchMode};
pub use router::{classify, CommandRouter};
pub use sandbox::{RuleSandbox, SandboxDecision, SandboxPolicy, SandboxRule};
pub use write_guard::WriteGuard;
