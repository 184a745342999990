//! Command execution traits and outcome classification.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::util::text::truncate_with_marker;

/// Byte ceiling for stored results and error summaries.
pub const MAX_OUTPUT_BYTES: usize = 65_500;

/// Raw observation of one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal or never ran.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error, or a synthetic message.
    pub stderr: String,
    /// Whether the wall-clock timeout fired.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Output of a process that exited normally.
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Output of a run that hit its timeout.
    #[must_use]
    pub fn timeout(limit: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("timed out after {}s", limit.as_secs_f64()),
            timed_out: true,
        }
    }

    /// Output of a command that could not be started.
    pub fn spawn_failed(reason: impl std::fmt::Display) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("failed to run command: {reason}"),
            timed_out: false,
        }
    }

    /// Exit status zero and no timeout.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, Some(0))
    }

    /// Classify this run, trimming and truncating the text that gets stored.
    #[must_use]
    pub fn into_outcome(self) -> ExecutionOutcome {
        if self.is_success() {
            return ExecutionOutcome::Succeeded {
                output: truncate_with_marker(self.stdout.trim(), MAX_OUTPUT_BYTES),
            };
        }
        let stderr = self.stderr.trim();
        let summary = if !stderr.is_empty() {
            stderr.to_string()
        } else if let Some(code) = self.exit_code {
            format!("exit_code={code}")
        } else {
            "terminated by signal".to_string()
        };
        ExecutionOutcome::Failed {
            error: truncate_with_marker(&summary, MAX_OUTPUT_BYTES),
        }
    }
}

/// What the execution engine does with a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The command succeeded; `output` becomes the job result.
    Succeeded {
        /// Trimmed, truncated stdout.
        output: String,
    },
    /// The command failed or timed out; drives retry and dead-lettering.
    Failed {
        /// Error summary stored as `last_error`.
        error: String,
    },
}

/// Abstraction for running a job's command.
///
/// Implementations never fail: spawn errors and timeouts are reported inside
/// the returned [`CommandOutput`] so a misbehaving command cannot crash the
/// worker.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use queuectl::core::{CommandOutput, CommandRunner};
///
/// #[derive(Clone)]
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl CommandRunner for AlwaysOk {
///     async fn run(&self, _command: &str, _timeout: Option<Duration>) -> CommandOutput {
///         CommandOutput::exited(0, "ok", "")
///     }
/// }
/// ```
#[async_trait]
pub trait CommandRunner: Send + Sync + Clone + 'static {
    /// Run `command`, waiting at most `timeout` when one is given.
    async fn run(&self, command: &str, timeout: Option<Duration>) -> CommandOutput;
}
