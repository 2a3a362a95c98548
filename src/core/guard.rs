//! Execution guard for long-running stages.
//!
//! The guarded stages (execute, generate-images) run under a deadline. When
//! the deadline elapses the process is killed and whatever output was
//! captured so far is kept: running out of time is a result, not an error.
//! The captured text is always written to the stage's log file before the
//! outcome is returned.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::fs;
use tracing::{info, warn};

use super::error::{PipelineError, PipelineResult};
use super::stages::Stage;
use crate::adapters::{InvokeError, ToolInvoker, ToolOutput};

/// Result of a guarded run
#[derive(Debug)]
pub enum RunOutcome {
    /// The process exited on its own
    Completed {
        output: String,
        exit_code: Option<i32>,
    },

    /// The deadline elapsed and the process was killed
    TimedOut {
        partial_output: String,
        after: Duration,
    },

    /// The process never ran
    FailedToStart(InvokeError),
}

impl RunOutcome {
    fn from_output(output: ToolOutput, deadline: Option<Duration>) -> Self {
        if output.timed_out {
            RunOutcome::TimedOut {
                partial_output: output.stdout,
                after: deadline.unwrap_or(output.elapsed),
            }
        } else {
            RunOutcome::Completed {
                output: output.stdout,
                exit_code: output.exit_code,
            }
        }
    }

    /// Captured text, if the process ran at all
    pub fn output(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { output, .. } => Some(output),
            RunOutcome::TimedOut { partial_output, .. } => Some(partial_output),
            RunOutcome::FailedToStart(_) => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, RunOutcome::TimedOut { .. })
    }

    /// The process exited before its deadline
    pub fn finished(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// Runs deadline-bound stages and persists their output
pub struct ExecutionGuard<'a> {
    invoker: &'a dyn ToolInvoker,
}

impl<'a> ExecutionGuard<'a> {
    pub fn new(invoker: &'a dyn ToolInvoker) -> Self {
        Self { invoker }
    }

    /// Run `stage` and write its captured output to `log_file`
    ///
    /// A spawn failure is reported as `FailedToStart` and nothing is written.
    /// Other invoker failures abort with an error.
    pub async fn run<S>(&self, stage: &S, input: &S::Input, log_file: &Path) -> PipelineResult<RunOutcome>
    where
        S: Stage<Output = ToolOutput>,
    {
        let command = stage.command(input);
        let started = Instant::now();
        info!(stage = %stage.name(), deadline = ?command.deadline, "Starting guarded run");

        let output = match self.invoker.invoke(&command).await {
            Ok(output) => stage.interpret(input, output)?,
            Err(e @ InvokeError::Spawn { .. }) => {
                warn!(stage = %stage.name(), "Guarded process failed to start: {}", e);
                return Ok(RunOutcome::FailedToStart(e));
            }
            Err(e) => return Err(PipelineError::Tool(e)),
        };

        let outcome = RunOutcome::from_output(output, command.deadline);
        if let Some(text) = outcome.output() {
            write_log(log_file, text).await?;
        }

        match outcome {
            RunOutcome::TimedOut { after, .. } => warn!(
                stage = %stage.name(),
                after = ?after,
                log = %log_file.display(),
                "Deadline elapsed, process killed; partial output kept"
            ),
            _ => info!(
                stage = %stage.name(),
                elapsed = ?started.elapsed(),
                log = %log_file.display(),
                "Guarded run finished"
            ),
        }

        Ok(outcome)
    }
}

async fn write_log(path: &Path, text: &str) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(format!("Failed to create {}", parent.display()), e))?;
    }
    fs::write(path, text)
        .await
        .map_err(|e| PipelineError::io(format!("Failed to write {}", path.display()), e))
}
