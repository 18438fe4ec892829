//! Builder and runners for external tool invocations.
//!
//! [`ToolCommand`] holds a program and its argument tokens. It can be run
//! buffered ([`ToolCommand::execute`], used for ffprobe) or streamed
//! ([`ToolCommand::execute_streaming`], used for ffmpeg), where every stderr
//! line is handed to a callback as it arrives and a cancellation token kills
//! the child mid-run.
//!
//! The [`ToolRunner`] trait is the seam the export pipeline spawns through,
//! so tests can substitute a fake that never touches a real process.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use cutlist_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default number of stderr lines kept for failure messages.
pub const DEFAULT_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Process exit code (`None` when killed by a signal).
    pub exit_code: Option<i32>,
    /// Captured standard output (lossy UTF-8). Empty for streamed runs.
    pub stdout: String,
    /// Captured standard error. For streamed runs only the last few lines.
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// Arguments are discrete tokens; nothing is ever passed through a shell.
///
/// # Example
///
/// ```no_run
/// use cutlist_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> cutlist_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_format", "-of", "json"])
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    tail_lines: usize,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.arg(path.to_string_lossy())
    }

    /// Kill the process if it runs longer than `d`. No limit by default.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// How many trailing stderr lines to keep for error messages.
    pub fn tail_lines(&mut self, n: usize) -> &mut Self {
        self.tail_lines = n;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short program name used in logs and errors.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// The invocation rendered as a single line, for logging only.
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::tool(self.tool_name(), format!("failed to spawn: {e}"))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Tool`] if spawning fails, the process exits non-zero
    ///   (message includes stderr), or the timeout expires.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let name = self.tool_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::tool(&name, format!("timed out after {limit:?}")))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::tool(&name, format!("I/O error waiting for process: {e}")))?;

        let tool_output = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::tool(
                name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }

    /// Execute the command, handing each stderr line to `on_line` as it is
    /// produced.
    ///
    /// When `cancel` fires the child is killed and reaped before this
    /// returns [`Error::Cancelled`]. On a non-zero exit the returned
    /// [`Error::Tool`] carries the last `tail_lines` lines of stderr.
    pub async fn execute_streaming(
        &self,
        on_line: &mut (dyn FnMut(&str) + Send),
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        let name = self.tool_name();
        tracing::debug!(tool = %name, command = %self.display(), "spawning");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr was not captured".into()))?;
        let mut lines = BufReader::new(stderr).lines();

        let mut tail: VecDeque<String> = VecDeque::with_capacity(self.tail_lines);
        let deadline = self.timeout.map(|d| tokio::time::Instant::now() + d);
        let mut stderr_open = true;

        let status = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Next::Cancelled,
                _ = sleep_until(deadline) => Next::TimedOut,
                line = lines.next_line(), if stderr_open => Next::Line(line),
                status = child.wait(), if !stderr_open => Next::Exited(status),
            };

            match next {
                Next::Cancelled => {
                    tracing::info!(tool = %name, "cancellation requested, terminating process");
                    terminate(&mut child).await;
                    return Err(Error::Cancelled);
                }
                Next::TimedOut => {
                    tracing::warn!(tool = %name, "timed out, terminating process");
                    terminate(&mut child).await;
                    return Err(Error::tool(
                        name,
                        format!("timed out after {:?}", self.timeout.unwrap_or_default()),
                    ));
                }
                Next::Line(Ok(Some(line))) => {
                    tracing::trace!(tool = %name, "{line}");
                    // Progress blocks would crowd the actual error out of the tail.
                    if self.tail_lines > 0 && !is_progress_line(&line) {
                        if tail.len() == self.tail_lines {
                            tail.pop_front();
                        }
                        tail.push_back(line.clone());
                    }
                    on_line(&line);
                }
                Next::Line(Ok(None)) => stderr_open = false,
                Next::Line(Err(e)) => {
                    tracing::debug!(tool = %name, error = %e, "stderr read failed");
                    stderr_open = false;
                }
                Next::Exited(status) => {
                    break status.map_err(|e| {
                        Error::tool(&name, format!("I/O error waiting for process: {e}"))
                    })?;
                }
            }
        };

        let stderr_tail = Vec::from(tail).join("\n");
        if !status.success() {
            return Err(Error::tool(
                name,
                format!("exited with status {status}: {}", stderr_tail.trim()),
            ));
        }

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: String::new(),
            stderr: stderr_tail,
        })
    }
}

enum Next {
    Cancelled,
    TimedOut,
    Line(std::io::Result<Option<String>>),
    Exited(std::io::Result<std::process::ExitStatus>),
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Kill the child and reap it so no zombie is left behind.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill child process");
    }
}

// ---------------------------------------------------------------------------
// ToolRunner
// ---------------------------------------------------------------------------

/// Something that can run a [`ToolCommand`] with streamed stderr and
/// cancellation.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        command: &ToolCommand,
        on_line: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(
        &self,
        command: &ToolCommand,
        on_line: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        command.execute_streaming(on_line, cancel).await
    }
}

/// `key=value` lines written by `-progress`.
fn is_progress_line(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, value)) => {
            !key.is_empty()
                && key
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"), "{err}");
    }

    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[test]
    fn progress_lines_are_recognized() {
        assert!(is_progress_line("out_time_us=1500000"));
        assert!(is_progress_line("stream_0_0_q=28.0"));
        assert!(is_progress_line("speed=N/A"));
        assert!(!is_progress_line("Conversion failed!"));
        assert!(!is_progress_line("[mp4 @ 0x5] codec=h264 is not supported here"));
    }

    #[tokio::test]
    async fn streaming_forwards_stderr_lines() {
        let cmd = sh("echo one >&2; echo two >&2");
        let mut seen = Vec::new();
        let out = cmd
            .execute_streaming(&mut |l| seen.push(l.to_string()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(seen, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn streaming_failure_carries_stderr_tail() {
        let mut cmd = sh("for i in 1 2 3 4 5; do echo line$i >&2; done; exit 3");
        cmd.tail_lines(2);
        let err = cmd
            .execute_streaming(&mut |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line4") && msg.contains("line5"), "{msg}");
        assert!(!msg.contains("line3"), "{msg}");
    }

    #[tokio::test]
    async fn streaming_cancel_kills_child() {
        let cmd = sh("echo started >&2; sleep 30");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let started = std::time::Instant::now();
        let err = cmd
            .execute_streaming(&mut |_| trigger.cancel(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn display_quotes_whitespace() {
        let mut cmd = ToolCommand::new(PathBuf::from("ffmpeg"));
        cmd.args(["-i", "my clip.mp4"]);
        assert_eq!(cmd.display(), "ffmpeg -i \"my clip.mp4\"");
        assert_eq!(cmd.get_args().len(), 2);
    }
}
