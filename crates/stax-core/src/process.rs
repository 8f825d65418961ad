//! Builder for executing external tools with timeout supervision.
//!
//! Two execution modes are offered:
//! - [`ToolCommand::execute`] captures all output under a wall-clock cap.
//! - [`ToolCommand::supervise`] streams output line by line and terminates the
//!   child when it goes quiet for longer than the idle window, or when an
//!   optional hard cap elapses.
//!
//! Arguments are always passed as an argv list, never through a shell.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::error::{TimeoutKind, ToolError};

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Time a terminated child gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL: usize = 40;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Clocks governing a supervised run.
#[derive(Debug, Clone, Copy)]
pub struct Supervision {
    /// Maximum silence between two output lines
    pub idle: Duration,
    /// Absolute cap on the whole run
    pub hard: Option<Duration>,
}

/// A builder for constructing and executing external tool invocations.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    stdin_data: Option<Vec<u8>>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            stdin_data: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Provide data to be written to the process's stdin.
    pub fn stdin(&mut self, data: Vec<u8>) -> &mut Self {
        self.stdin_data = Some(data);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Short tool name used in logs and errors.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if self.stdin_data.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn(&self) -> Result<Child, ToolError> {
        tracing::debug!(tool = %self.tool_name(), args = ?self.args, "Spawning");
        self.command().spawn().map_err(|e| ToolError::Spawn {
            tool: self.tool_name(),
            message: e.to_string(),
        })
    }

    async fn feed_stdin(&self, child: &mut Child) -> Result<(), ToolError> {
        if let Some(ref data) = self.stdin_data {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data).await.map_err(|e| ToolError::Io {
                    tool: self.tool_name(),
                    message: format!("failed to write stdin: {e}"),
                })?;
                // Dropping stdin closes the pipe so the child can proceed.
            }
        }
        Ok(())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// Non-zero exit, spawn failure and timeout are all errors. On timeout
    /// the child is killed when its handle is dropped.
    pub async fn execute(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.tool_name();
        let mut child = self.spawn()?;
        self.feed_stdin(&mut child).await?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(ToolError::Exit {
                        tool,
                        status: output.status.to_string(),
                        stderr: tool_output.stderr.trim().to_string(),
                    });
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(ToolError::Io {
                tool,
                message: format!("waiting for process: {e}"),
            }),
            Err(_elapsed) => Err(ToolError::Timeout {
                tool,
                kind: TimeoutKind::WallClock,
                after: self.timeout,
            }),
        }
    }

    /// Run the command while watching its output.
    ///
    /// Every line on stdout or stderr resets the idle clock. When a clock
    /// fires the child is terminated (SIGTERM first on unix, then killed after
    /// a grace period) and a [`ToolError::Timeout`] names the clock.
    pub async fn supervise(&self, limits: Supervision) -> Result<ToolOutput, ToolError> {
        let tool = self.tool_name();
        let mut child = self.spawn()?;
        self.feed_stdin(&mut child).await?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child).await;
            return Err(ToolError::Io {
                tool,
                message: "output pipes unavailable".into(),
            });
        };
        let mut out_reader = BufReader::new(stdout);
        let mut err_reader = BufReader::new(stderr);
        let mut out_pending = Vec::new();
        let mut err_pending = Vec::new();
        let mut out_open = true;
        let mut err_open = true;

        let mut stdout_buf = String::new();
        let mut stderr_tail: Vec<String> = Vec::new();

        let hard_deadline = limits.hard.map(|d| Instant::now() + d);

        enum Event {
            Stdout(std::io::Result<usize>),
            Stderr(std::io::Result<usize>),
            Exited(std::io::Result<ExitStatus>),
            Expired(TimeoutKind),
        }

        // read_until is cancel safe: a partial line stays in its pending buffer.
        let status = loop {
            let event = tokio::select! {
                read = out_reader.read_until(b'\n', &mut out_pending), if out_open => {
                    Event::Stdout(read)
                }
                read = err_reader.read_until(b'\n', &mut err_pending), if err_open => {
                    Event::Stderr(read)
                }
                status = child.wait(), if !out_open && !err_open => Event::Exited(status),
                _ = tokio::time::sleep(limits.idle) => Event::Expired(TimeoutKind::Idle),
                _ = sleep_until_opt(hard_deadline), if hard_deadline.is_some() => {
                    Event::Expired(TimeoutKind::WallClock)
                }
            };

            match event {
                Event::Stdout(Ok(0)) => out_open = false,
                Event::Stdout(Ok(_)) => {
                    let line = take_line(&mut out_pending);
                    tracing::debug!(tool = %tool, "{line}");
                    stdout_buf.push_str(&line);
                    stdout_buf.push('\n');
                }
                Event::Stderr(Ok(0)) => err_open = false,
                Event::Stderr(Ok(_)) => {
                    let line = take_line(&mut err_pending);
                    tracing::debug!(tool = %tool, stream = "stderr", "{line}");
                    if stderr_tail.len() == STDERR_TAIL {
                        stderr_tail.remove(0);
                    }
                    stderr_tail.push(line);
                }
                Event::Stdout(Err(e)) | Event::Stderr(Err(e)) => {
                    terminate(&mut child).await;
                    return Err(ToolError::Io {
                        tool,
                        message: format!("reading output: {e}"),
                    });
                }
                Event::Exited(Ok(status)) => break status,
                Event::Exited(Err(e)) => {
                    return Err(ToolError::Io {
                        tool,
                        message: format!("waiting for process: {e}"),
                    });
                }
                Event::Expired(kind) => {
                    let after = match kind {
                        TimeoutKind::Idle => limits.idle,
                        TimeoutKind::WallClock => limits.hard.unwrap_or_default(),
                    };
                    tracing::warn!(tool = %tool, %kind, secs = after.as_secs(), "Terminating");
                    terminate(&mut child).await;
                    return Err(ToolError::Timeout { tool, kind, after });
                }
            }
        };

        let stderr = stderr_tail.join("\n");
        if !status.success() {
            return Err(ToolError::Exit {
                tool,
                status: status.to_string(),
                stderr,
            });
        }

        Ok(ToolOutput {
            status,
            stdout: stdout_buf,
            stderr,
        })
    }

    /// Start the command detached from our pipes and hand back the child.
    pub fn spawn_detached(&self) -> Result<Child, ToolError> {
        tracing::debug!(tool = %self.tool_name(), args = ?self.args, "Launching");
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ToolError::Spawn {
                tool: self.tool_name(),
                message: e.to_string(),
            })
    }
}

/// Drain one line from `pending`, decoded lossily and without its terminator.
fn take_line(pending: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(pending)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    pending.clear();
    line
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Ask the child to exit, escalating to a kill if it lingers.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id().and_then(|p| i32::try_from(p).ok()) {
            if kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
                && matches!(
                    tokio::time::timeout(TERMINATE_GRACE, child.wait()).await,
                    Ok(Ok(_))
                )
            {
                return;
            }
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Kill after terminate failed");
    }
}

/// Locate an executable: an explicit override if it exists, else `PATH`.
pub fn locate(name: &str, override_path: Option<&Path>) -> Result<PathBuf, ToolError> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(tool = name, path = %path.display(), "Configured path missing, searching PATH");
    }
    which::which(name).map_err(|_| ToolError::NotOnPath {
        tool: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new("echo").arg("hello").execute().await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new("nonexistent_tool_xyz_12345")
            .execute()
            .await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new("sleep")
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Timeout {
                kind: TimeoutKind::WallClock,
                ..
            }
        ));
        assert!(err.to_string().contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_is_delivered() {
        let out = ToolCommand::new("cat")
            .stdin(b"{\"continue\": true}".to_vec())
            .execute()
            .await
            .unwrap();
        assert!(out.stdout.contains("continue"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .execute()
            .await
            .unwrap_err();
        match err {
            ToolError::Exit { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn supervise_idle_timeout_terminates_silent_child() {
        let started = std::time::Instant::now();
        let err = ToolCommand::new("sleep")
            .arg("30")
            .supervise(Supervision {
                idle: Duration::from_millis(200),
                hard: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Timeout {
                kind: TimeoutKind::Idle,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn supervise_output_keeps_child_alive() {
        // Emits a line every 100ms for ~0.6s with a 300ms idle window.
        let out = ToolCommand::new("sh")
            .args(["-c", "for i in 1 2 3 4 5 6; do echo tick $i; sleep 0.1; done"])
            .supervise(Supervision {
                idle: Duration::from_millis(300),
                hard: None,
            })
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout.lines().count(), 6);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn supervise_hard_cap_fires_despite_output() {
        let err = ToolCommand::new("sh")
            .args(["-c", "while true; do echo busy; sleep 0.05; done"])
            .supervise(Supervision {
                idle: Duration::from_secs(5),
                hard: Some(Duration::from_millis(300)),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Timeout {
                kind: TimeoutKind::WallClock,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn supervise_reports_exit_code_with_stderr() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo 'import failed' >&2; exit 1"])
            .supervise(Supervision {
                idle: Duration::from_secs(5),
                hard: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("import failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn supervise_survives_non_utf8_output() {
        // A Latin-1 byte, then more output than a pipe buffer holds.
        let out = ToolCommand::new("sh")
            .args([
                "-c",
                "printf 'caf\\351\\n'; i=0; while [ $i -lt 4000 ]; do \
                 echo \"line $i padded out to fill the pipe\"; i=$((i+1)); done; exit 0",
            ])
            .supervise(Supervision {
                idle: Duration::from_secs(5),
                hard: None,
            })
            .await
            .unwrap();
        assert!(out.status.success());
        let mut lines = out.stdout.lines();
        assert_eq!(lines.next(), Some("caf\u{FFFD}"));
        assert_eq!(lines.count(), 4000);
    }

    #[test]
    fn take_line_strips_terminator_and_clears() {
        let mut pending = b"frame 12\r\n".to_vec();
        assert_eq!(take_line(&mut pending), "frame 12");
        assert!(pending.is_empty());
    }

    #[test]
    fn locate_prefers_existing_override() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("blender");
        std::fs::write(&fake, b"").unwrap();
        assert_eq!(locate("blender", Some(&fake)).unwrap(), fake);
    }

    #[test]
    fn locate_reports_missing_tool() {
        let err = locate("nonexistent_tool_xyz_12345", None).unwrap_err();
        assert!(matches!(err, ToolError::NotOnPath { .. }));
    }
}
