//! Error types for the Synapse core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("shell session is not ready: {0}")]
    ShellNotReady(String),

    #[error("another command is already executing in this shell session")]
    ShellBusy,

    #[error("shell process exited unexpectedly: {0}")]
    ShellExited(String),

    /// The literal "Command execution timeout" is load-bearing: the Bash
    /// tool scans for it to decide when to self-heal with a restart.
    #[error("Command execution timeout after {0}ms")]
    CommandTimeout(u64),

    #[error("failed to spawn shell: {0}")]
    SpawnFailed(String),

    #[error("failed to initialize handler for '{0}'")]
    HandlerInit(String),

    #[error("no handler registered for '{0}'")]
    HandlerNotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when this error (or an error message derived from it) should
    /// trigger the Bash tool's timeout self-heal path.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CommandTimeout(_))
    }
}
