//! Adapter interfaces for external tools.
//!
//! Every stage of the pipeline shells out to an opaque external program
//! (format converter, model converter, code generator, build tool, the
//! generated artifact itself). Adapters provide a single invocation contract
//! so stages can be driven by the real process runner or a scripted fake.

pub mod process;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use process::ProcessInvoker;

/// How the child's standard error is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrMode {
    /// Captured separately into `ToolOutput::stderr`
    #[default]
    Separate,

    /// Interleaved into the standard output capture
    Merge,
}

/// A program and the arguments that always precede stage arguments
///
/// `java -jar m2c.jar` is `{ program: "java", args: ["-jar", "m2c.jar"] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Start a command for this tool with its leading arguments applied
    pub fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.program).args(&self.args)
    }
}

/// A fully described invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,

    /// Variables set on top of the inherited environment
    pub env: Vec<(OsString, OsString)>,
    pub stderr: StderrMode,

    /// Kill the process and keep partial output once this elapses
    pub deadline: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            stderr: StderrMode::default(),
            deadline: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn merge_stderr(mut self) -> Self {
        self.stderr = StderrMode::Merge;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Put `dir` in front of the inherited `PATH`
    pub fn prepend_path(self, dir: &Path) -> Self {
        let mut entries = vec![dir.to_path_buf()];
        if let Some(existing) = std::env::var_os("PATH") {
            entries.extend(std::env::split_paths(&existing));
        }
        let joined = std::env::join_paths(entries).unwrap_or_else(|_| dir.as_os_str().to_os_string());
        self.env("PATH", joined)
    }

    /// Value an invocation will see for `key`, if overridden
    pub fn env_value(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What a finished (or killed) process left behind
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Captured standard output, trailing whitespace trimmed
    pub stdout: String,

    /// Captured standard error (empty when merged)
    pub stderr: String,

    /// Exit code; `None` when killed or terminated by a signal
    pub exit_code: Option<i32>,

    /// The deadline elapsed and the process was killed
    pub timed_out: bool,

    pub elapsed: Duration,
}

impl ToolOutput {
    /// Completed output with exit code 0
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    /// Output of a process killed at its deadline
    pub fn timed_out(partial: impl Into<String>) -> Self {
        Self {
            stdout: partial.into(),
            timed_out: true,
            ..Default::default()
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Non-empty stdout lines, in order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

/// Failures to run a tool at all
///
/// A non-zero exit code is not an error; stages interpret it.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read output of '{command}': {source}")]
    StreamRead {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for '{command}' to finish: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external tools
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Human-readable invoker name
    fn name(&self) -> &str;

    /// Run the command to completion or until its deadline
    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, InvokeError>;
}
