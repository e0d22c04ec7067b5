//! Environment-driven configuration for the execution core

use std::time::Duration;

const DEFAULT_SHELL: &str = "/bin/bash";
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RESTART_DELAY_MS: u64 = 200;
const DEFAULT_RECENT_TOOLS_MAX: usize = 5;
const DEFAULT_MAX_TOOL_FAILURES: u32 = 3;

/// Runtime knobs, each overridable through the environment.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Shell command line. Tokenized with quote support so wrappers
    /// (e.g. sandbox launchers) can be passed: `SYNAPSE_SHELL`.
    pub shell_command: String,
    /// Per-command deadline: `SYNAPSE_COMMAND_TIMEOUT_MS`.
    pub command_timeout: Duration,
    /// Pause between killing the old shell and spawning a fresh one:
    /// `SYNAPSE_RESTART_DELAY_MS`.
    pub restart_delay: Duration,
    /// Ring length for a sub-agent's recent tool ids:
    /// `SYNAPSE_RECENT_TOOLS_MAX`.
    pub recent_tools_max: usize,
    /// Consecutive countable failures before the outer agent trips. The
    /// core only classifies; enforcement belongs to the outer loop:
    /// `SYNAPSE_MAX_TOOL_FAILURES`.
    pub max_tool_failures: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            shell_command: DEFAULT_SHELL.to_string(),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            recent_tools_max: DEFAULT_RECENT_TOOLS_MAX,
            max_tool_failures: DEFAULT_MAX_TOOL_FAILURES,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            shell_command: std::env::var("SYNAPSE_SHELL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.shell_command),
            command_timeout: env_ms("SYNAPSE_COMMAND_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.command_timeout),
            restart_delay: env_ms("SYNAPSE_RESTART_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.restart_delay),
            recent_tools_max: env_ms("SYNAPSE_RECENT_TOOLS_MAX")
                .map(|v| v as usize)
                .unwrap_or(defaults.recent_tools_max),
            max_tool_failures: env_ms("SYNAPSE_MAX_TOOL_FAILURES")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_tool_failures),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell_command = shell.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

fn env_ms(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.shell_command, "/bin/bash");
        assert_eq!(cfg.command_timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.restart_delay, Duration::from_millis(200));
        assert_eq!(cfg.recent_tools_max, 5);
        assert_eq!(cfg.max_tool_failures, 3);
    }

    #[test]
    fn test_builders() {
        let cfg = CoreConfig::default()
            .with_shell("/bin/sh")
            .with_command_timeout(Duration::from_secs(5));
        assert_eq!(cfg.shell_command, "/bin/sh");
        assert_eq!(cfg.command_timeout, Duration::from_secs(5));
    }
}
