//! Tool-failure taxonomy and self-correction hints
//!
//! Raw stderr is mapped onto a closed set of categories by a
//! case-insensitive keyword scan. The category drives two policies: whether
//! to append the "learn --help then retry" hint to the output, and whether
//! the failure counts toward the outer loop's consecutive-failure breaker.

use serde::{Deserialize, Serialize};

/// Closed failure taxonomy. The keyword sets are non-overlapping by
/// construction, so every stderr maps to exactly one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCategory {
    CommandNotFound,
    InvalidUsage,
    ExecutionError,
}

const NOT_FOUND_KEYWORDS: &[&str] = &["unknown tool", "command not found", "unknown command"];

const USAGE_KEYWORDS: &[&str] = &[
    "usage:",
    "requires a number argument",
    "must be a non-negative number",
    "unexpected argument:",
    "invalid parameters",
];

impl FailureCategory {
    pub fn classify(stderr: &str) -> Self {
        let lowered = stderr.to_lowercase();
        if NOT_FOUND_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Self::CommandNotFound
        } else if USAGE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Self::InvalidUsage
        } else {
            Self::ExecutionError
        }
    }

    /// Execution errors are domain failures, not usage mistakes; telling the
    /// model to read the help would be noise.
    pub fn should_attach_self_description(self) -> bool {
        self != Self::ExecutionError
    }

    /// Whether this failure counts toward a consecutive-failure breaker.
    pub fn should_count_failure(self) -> bool {
        matches!(self, Self::CommandNotFound | Self::InvalidUsage)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandNotFound => "CommandNotFound",
            Self::InvalidUsage => "InvalidUsage",
            Self::ExecutionError => "ExecutionError",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The machine-targeted self-correction hint appended to failed output.
pub fn help_hint(base_command: &str) -> String {
    format!(
        "\n\nSelf-description: The command failed. Next step: run \
         `Bash(command=\"{base_command} --help\")` to learn usage, then retry \
         with valid arguments."
    )
}
