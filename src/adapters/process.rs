//! Subprocess invoker.
//!
//! Spawns the tool with `tokio::process`, drains its output streams on
//! background reader tasks and waits for exit, optionally under a deadline.
//! When the deadline elapses the child is killed outright and whatever the
//! readers accumulated so far is returned with `timed_out` set.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{InvokeError, StderrMode, ToolCommand, ToolInvoker, ToolOutput};

/// How long to wait for readers to hit EOF after the process is gone.
/// Grandchildren that inherited the pipes can keep them open indefinitely.
const DEFAULT_READ_GRACE: Duration = Duration::from_secs(2);

/// Invoker backed by real OS processes
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    read_grace: Duration,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self {
            read_grace: DEFAULT_READ_GRACE,
        }
    }

    /// Override the post-exit drain window
    pub fn with_read_grace(read_grace: Duration) -> Self {
        Self { read_grace }
    }
}

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    fn name(&self) -> &str {
        "process"
    }

    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, InvokeError> {
        let command_line = command.to_string();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| InvokeError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        debug!(command = %command_line, pid = ?child.id(), "Spawned tool");

        let stdout_buf = SharedBuffer::default();
        let stderr_buf = match command.stderr {
            StderrMode::Merge => stdout_buf.clone(),
            StderrMode::Separate => SharedBuffer::default(),
        };

        let stdout_reader = child
            .stdout
            .take()
            .map(|s| ReaderTask::spawn(s, stdout_buf.clone()));
        let stderr_reader = child
            .stderr
            .take()
            .map(|s| ReaderTask::spawn(s, stderr_buf.clone()));

        let (exit_code, timed_out) = match command.deadline {
            None => {
                let status = child.wait().await.map_err(|source| InvokeError::Wait {
                    command: command_line.clone(),
                    source,
                })?;
                (status.code(), false)
            }
            Some(deadline) => match timeout(deadline, child.wait()).await {
                Ok(status) => {
                    let status = status.map_err(|source| InvokeError::Wait {
                        command: command_line.clone(),
                        source,
                    })?;
                    (status.code(), false)
                }
                Err(_) => {
                    info!(command = %command_line, ?deadline, "Deadline reached, killing process");
                    if let Err(e) = child.kill().await {
                        warn!(command = %command_line, error = %e, "Failed to kill process");
                    }
                    (None, true)
                }
            },
        };

        for reader in [stdout_reader, stderr_reader].into_iter().flatten() {
            if let Err(source) = reader.finish(self.read_grace).await {
                if command.deadline.is_some() {
                    // Guarded runs keep whatever was captured
                    warn!(command = %command_line, error = %source, "Output stream read failed");
                } else {
                    return Err(InvokeError::StreamRead {
                        command: command_line,
                        source,
                    });
                }
            }
        }

        let stdout = stdout_buf.snapshot().trim_end().to_string();
        let stderr = if command.stderr == StderrMode::Merge {
            String::new()
        } else {
            stderr_buf.snapshot().trim_end().to_string()
        };

        Ok(ToolOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
            elapsed: started.elapsed(),
        })
    }
}

/// Text accumulated by one or more reader tasks
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<String>>);

impl SharedBuffer {
    fn push_line(&self, line: &str) {
        let mut buf = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buf.push_str(line);
        if !line.ends_with('\n') {
            buf.push('\n');
        }
    }

    fn snapshot(&self) -> String {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Owned handle to a stream drainer; aborted if dropped unfinished
struct ReaderTask {
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl ReaderTask {
    fn spawn<R>(stream: R, buffer: SharedBuffer) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                if reader.read_until(b'\n', &mut raw).await? == 0 {
                    return Ok(());
                }
                let line = String::from_utf8_lossy(&raw);
                debug!(line = %line.trim_end(), "tool output");
                buffer.push_line(&line);
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Wait up to `grace` for EOF, then abort
    async fn finish(mut self, grace: Duration) -> std::io::Result<()> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        match timeout(grace, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                join_error.to_string(),
            )),
            Err(_) => {
                debug!("Output stream still open after grace period, detaching reader");
                handle.abort();
                Ok(())
            }
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_captures_trimmed_stdout_and_exit_code() {
        let invoker = ProcessInvoker::new();
        let output = invoker
            .invoke(&sh("echo first; echo /tmp/result.xml; echo"))
            .await
            .unwrap();

        assert_eq!(output.stdout, "first\n/tmp/result.xml");
        assert_eq!(output.exit_code, Some(0));
        assert!(!output.timed_out);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let invoker = ProcessInvoker::new();
        let output = invoker.invoke(&sh("echo oops >&2; exit 3")).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr, "oops");
        assert!(output.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_merged_stderr_lands_in_stdout() {
        let invoker = ProcessInvoker::new();
        let output = invoker
            .invoke(&sh("echo out; echo err >&2").merge_stderr())
            .await
            .unwrap();

        assert!(output.stdout.contains("out"));
        assert!(output.stdout.contains("err"));
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let invoker = ProcessInvoker::new();
        let result = invoker
            .invoke(&ToolCommand::new("/definitely/not/a/program"))
            .await;

        assert!(matches!(result, Err(InvokeError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_deadline_kills_and_keeps_partial_output() {
        let invoker = ProcessInvoker::with_read_grace(Duration::from_millis(200));
        let started = Instant::now();
        let output = invoker
            .invoke(&sh("echo partial; sleep 30; echo never").deadline(Duration::from_millis(500)))
            .await
            .unwrap();

        assert!(output.timed_out);
        assert_eq!(output.stdout, "partial");
        assert_eq!(output.exit_code, None);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fast_process_finishes_before_deadline() {
        let invoker = ProcessInvoker::new();
        let output = invoker
            .invoke(&sh("echo done").deadline(Duration::from_secs(10)))
            .await
            .unwrap();

        assert!(!output.timed_out);
        assert_eq!(output.stdout, "done");
    }

    #[tokio::test]
    async fn test_env_and_working_dir_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = ProcessInvoker::new();
        let output = invoker
            .invoke(
                &sh("echo $QUADRAT_TEST_VALUE; pwd")
                    .env("QUADRAT_TEST_VALUE", "hello")
                    .current_dir(dir.path()),
            )
            .await
            .unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "hello");
        let reported = std::path::PathBuf::from(lines[1]).canonicalize().unwrap();
        assert_eq!(reported, dir.path().canonicalize().unwrap());
    }
}
