//! Persistent shell session with marker-framed command execution
//!
//! The session owns one interactive child shell. Each command is written to
//! the child's stdin followed by a marker suffix that echoes the exit code;
//! a stdout reader task probes the buffer on every chunk and settles the
//! pending execution when the end marker appears. The per-command deadline
//! is a single timer armed when the execution is registered.
//!
//! State machine: Idle -> Ready -> Executing -> Ready | Broken. A Broken
//! session rejects every `execute` until `restart` respawns the child.

use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use synapse_core::{command, CoreConfig, Error, Result};

/// Wire markers injected after every command. They are implementation
/// details and are stripped before output reaches anyone.
pub const EXIT_CODE_MARKER: &str = "___SYNAPSE_EXIT_CODE___";
pub const COMMAND_END_MARKER: &str = "___SYNAPSE_COMMAND_END___";

fn exit_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            "{}(\\d+){}",
            regex::escape(EXIT_CODE_MARKER),
            regex::escape(COMMAND_END_MARKER)
        ))
        .expect("marker regex is valid")
    })
}

/// Output of one completed command.
#[derive(Clone, Debug)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No child yet; the first `execute` spawns one.
    Idle,
    Ready,
    Executing,
    /// Child gone or timed out mid-command; only `restart` recovers.
    Broken,
}

struct Pending {
    settle: oneshot::Sender<Result<ShellOutput>>,
}

struct State {
    phase: Phase,
    stdout_buf: String,
    stderr_buf: String,
    pending: Option<Pending>,
    kill_tx: Option<oneshot::Sender<()>>,
    /// Bumped on every spawn so tasks from a previous child ignore state.
    generation: u64,
}

impl State {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            stdout_buf: String::new(),
            stderr_buf: String::new(),
            pending: None,
            kill_tx: None,
            generation: 0,
        }
    }

    /// Completion probe, run on every stdout chunk. When the end marker is
    /// present: extract the exit code, strip the marker line, settle.
    fn probe_completion(&mut self) {
        if !self.stdout_buf.contains(COMMAND_END_MARKER) {
            return;
        }
        let Some(caps) = exit_code_regex().captures(&self.stdout_buf) else {
            // End marker seen but the exit-code digits have not fully
            // arrived yet; the next chunk completes the line.
            return;
        };
        let exit_code: i32 = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(-1);
        let marker_start = caps.get(0).map(|m| m.start()).unwrap_or(0);

        let stdout = self.stdout_buf[..marker_start].to_string();
        let stderr = std::mem::take(&mut self.stderr_buf);
        self.stdout_buf.clear();
        self.phase = Phase::Ready;

        if let Some(pending) = self.pending.take() {
            let _ = pending.settle.send(Ok(ShellOutput {
                stdout,
                stderr,
                exit_code,
            }));
        }
    }

    /// Reject any pending execution and mark the session broken.
    fn break_with(&mut self, err: Error) {
        self.phase = Phase::Broken;
        self.stdout_buf.clear();
        self.stderr_buf.clear();
        self.kill_tx = None;
        if let Some(pending) = self.pending.take() {
            let _ = pending.settle.send(Err(err));
        }
    }
}

/// One persistent interactive shell. Cheap to share behind `Arc`; commands
/// are serialized by the execution interlock, not by the caller.
pub struct ShellSession {
    config: CoreConfig,
    state: Arc<Mutex<State>>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    /// Serializes spawn/restart/cleanup so overlapping lifecycle calls
    /// cannot interleave half-torn-down children.
    lifecycle: tokio::sync::Mutex<()>,
}

impl ShellSession {
    /// Create a session without spawning the child; the first `execute`
    /// starts it.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State::new())),
            stdin: tokio::sync::Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state.lock().unwrap().phase, Phase::Ready)
    }

    pub fn is_executing(&self) -> bool {
        matches!(self.state.lock().unwrap().phase, Phase::Executing)
    }

    /// Execute one command and wait for its completion marker.
    ///
    /// Fails fast with `Error::ShellBusy` when a command is already in
    /// flight; fails with `Error::CommandTimeout` when the deadline fires
    /// first, after which the session is broken until `restart`.
    pub async fn execute(&self, cmd: &str) -> Result<ShellOutput> {
        self.ensure_started().await?;

        let rx = {
            let mut st = self.state.lock().unwrap();
            match st.phase {
                Phase::Executing => return Err(Error::ShellBusy),
                Phase::Broken => {
                    return Err(Error::ShellNotReady(
                        "shell exited; restart the session".to_string(),
                    ))
                }
                Phase::Idle => {
                    return Err(Error::ShellNotReady("shell not started".to_string()))
                }
                Phase::Ready => {}
            }
            st.phase = Phase::Executing;
            st.stdout_buf.clear();
            st.stderr_buf.clear();
            let (tx, rx) = oneshot::channel();
            st.pending = Some(Pending { settle: tx });
            rx
        };

        if let Err(e) = self.write_stdin(&frame_command(cmd)).await {
            let mut st = self.state.lock().unwrap();
            st.pending = None;
            st.break_with(Error::ShellExited("stdin write failed".to_string()));
            return Err(e);
        }

        let timeout_ms = self.config.command_timeout.as_millis() as u64;
        match tokio::time::timeout(self.config.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Internal(
                "shell completion channel closed".to_string(),
            )),
            Err(_) => {
                // The command is still running inside the child; the session
                // is unusable until a restart replaces the child.
                let mut st = self.state.lock().unwrap();
                st.pending = None;
                st.phase = Phase::Broken;
                st.stdout_buf.clear();
                st.stderr_buf.clear();
                warn!(timeout_ms, "shell command deadline fired");
                Err(Error::CommandTimeout(timeout_ms))
            }
        }
    }

    /// Kill the child (rejecting any pending execution), wait the restart
    /// delay, and spawn a fresh one. Idempotent: restarting a restarted
    /// session yields an equally usable session.
    pub async fn restart(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.shutdown_child("shell session restarting").await;
        tokio::time::sleep(self.config.restart_delay).await;
        self.spawn_child().await
    }

    /// Terminate the child without respawning.
    pub async fn cleanup(&self) {
        let _guard = self.lifecycle.lock().await;
        self.shutdown_child("shell session closed").await;
    }

    async fn ensure_started(&self) -> Result<()> {
        if !matches!(self.state.lock().unwrap().phase, Phase::Idle) {
            return Ok(());
        }
        let _guard = self.lifecycle.lock().await;
        // Re-check under the lifecycle lock: another caller may have won.
        if matches!(self.state.lock().unwrap().phase, Phase::Idle) {
            self.spawn_child().await?;
        }
        Ok(())
    }

    async fn spawn_child(&self) -> Result<()> {
        let argv = command::tokenize(&self.config.shell_command);
        if argv.is_empty() {
            return Err(Error::SpawnFailed("empty shell command".to_string()));
        }

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        // Suppress user config so sessions behave identically everywhere.
        cmd.arg("--noprofile").arg("--norc");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::SpawnFailed(format!("{}: {e}", argv[0])))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::SpawnFailed("child stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::SpawnFailed("child stdout not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::SpawnFailed("child stderr not piped".to_string()))?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let generation = {
            let mut st = self.state.lock().unwrap();
            st.generation += 1;
            st.phase = Phase::Ready;
            st.stdout_buf.clear();
            st.stderr_buf.clear();
            st.kill_tx = Some(kill_tx);
            st.generation
        };

        debug!(shell = %self.config.shell_command, generation, "shell spawned");

        *self.stdin.lock().await = Some(stdin);

        self.spawn_stdout_pump(stdout, generation);
        self.spawn_stderr_pump(stderr, generation);
        self.spawn_exit_watcher(child, kill_rx, generation);

        Ok(())
    }

    fn spawn_stdout_pump(&self, mut stdout: tokio::process::ChildStdout, generation: u64) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut buf = [0u8; 8192];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut st = state.lock().unwrap();
                        if st.generation != generation {
                            break;
                        }
                        st.stdout_buf
                            .push_str(&String::from_utf8_lossy(&buf[..n]));
                        st.probe_completion();
                    }
                }
            }
        });
    }

    fn spawn_stderr_pump(&self, mut stderr: tokio::process::ChildStderr, generation: u64) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut buf = [0u8; 8192];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut st = state.lock().unwrap();
                        if st.generation != generation {
                            break;
                        }
                        st.stderr_buf
                            .push_str(&String::from_utf8_lossy(&buf[..n]));
                    }
                }
            }
        });
    }

    /// Watches for child exit. A requested kill (restart/cleanup) reaps
    /// quietly; anything else is an unexpected exit that breaks the session
    /// and rejects the pending execution.
    fn spawn_exit_watcher(
        &self,
        mut child: Child,
        mut kill_rx: oneshot::Receiver<()>,
        generation: u64,
    ) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let describe = match status {
                        Ok(s) => format!("status {s}"),
                        Err(e) => format!("wait failed: {e}"),
                    };
                    let mut st = state.lock().unwrap();
                    if st.generation == generation {
                        warn!(%describe, "shell exited unexpectedly");
                        st.break_with(Error::ShellExited(describe));
                    }
                }
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        });
    }

    async fn shutdown_child(&self, reason: &str) {
        let kill_tx = {
            let mut st = self.state.lock().unwrap();
            let kill_tx = st.kill_tx.take();
            st.break_with(Error::ShellExited(reason.to_string()));
            kill_tx
        };
        // Dropping stdin closes the pipe so the child sees EOF even if the
        // kill signal loses the race.
        *self.stdin.lock().await = None;
        if let Some(tx) = kill_tx {
            let _ = tx.send(());
        }
    }

    async fn write_stdin(&self, text: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| Error::ShellNotReady("shell stdin closed".to_string()))?;
        stdin.write_all(text.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// The wire framing: the command, then a suffix that captures `$?` and
/// echoes it between the two markers on its own line.
fn frame_command(cmd: &str) -> String {
    format!("{cmd}\n__ec=$?; echo \"{EXIT_CODE_MARKER}${{__ec}}{COMMAND_END_MARKER}\"\n")
}
