use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to keep draining a pipe once the child is gone. Background
/// processes started by the command can hold the pipe open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What running a requested command produced.
///
/// Failures are encoded in `text` so they can be forwarded to the AI verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub text: String,
    pub failed: bool,
}

impl CommandOutcome {
    fn success(stdout: &str, stderr: &str) -> Self {
        let text = format!("--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}");
        Self {
            text: text.trim().to_string(),
            failed: false,
        }
    }

    fn failure(description: impl AsRef<str>, stderr: &str) -> Self {
        Self {
            text: format!(
                "Command failed: {}\n--- stderr ---\n{}",
                description.as_ref(),
                stderr
            ),
            failed: true,
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion. Never fails; see [`CommandOutcome`].
    async fn run(&self, command: &str) -> CommandOutcome;
}

/// Runs commands through the host shell with a wall-clock bound.
pub struct ShellExecutor {
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, command: &str) -> CommandOutcome {
        let command = command.trim();
        if command.is_empty() {
            return CommandOutcome::failure("no command to run", "");
        }

        debug!(command, "executing command");

        let (shell, flag) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut child = match Command::new(shell)
            .arg(flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return CommandOutcome::failure(format!("could not start `{command}`: {err}"), "");
            }
        };

        let stdout = PipeCapture::start(child.stdout.take());
        let stderr = PipeCapture::start(child.stderr.take());

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                let (_, stderr) = tokio::join!(stdout.finish(), stderr.finish());
                return CommandOutcome::failure(format!("failed to wait for `{command}`: {err}"), &stderr);
            }
            Err(_) => {
                if let Err(err) = child.kill().await {
                    warn!(command, error = %err, "failed to kill timed out command");
                }
                let (_, stderr) = tokio::join!(stdout.finish(), stderr.finish());
                debug!(command, timeout = ?self.timeout, "command timed out");
                return CommandOutcome::failure(
                    format!("`{command}` timed out after {:?}", self.timeout),
                    &stderr,
                );
            }
        };

        let (stdout, stderr) = tokio::join!(stdout.finish(), stderr.finish());

        if !status.success() {
            let description = match status.code() {
                Some(code) => format!("`{command}` exited with code {code}"),
                None => format!("`{command}` was terminated by a signal"),
            };
            debug!(command, ?status, "command failed");
            return CommandOutcome::failure(description, &stderr);
        }

        let outcome = CommandOutcome::success(&stdout, &stderr);
        debug!(command, bytes = outcome.text.len(), "command finished");
        outcome
    }
}

/// Collects everything a child writes to one pipe. Bytes read so far stay
/// available even when the reader has to be abandoned.
struct PipeCapture {
    captured: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl PipeCapture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let sink = Arc::clone(&captured);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match pipe.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if let Ok(mut sink) = sink.lock() {
                                sink.extend_from_slice(&buf[..n]);
                            }
                        }
                    }
                }
            })
        });

        Self { captured, reader }
    }

    async fn finish(mut self) -> String {
        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        let bytes = self
            .captured
            .lock()
            .map(|captured| captured.clone())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
