//! Runs job commands through the host shell.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::{CommandOutput, CommandRunner};
use crate::util::process::kill_group;

/// Executes `sh -c <command>` in its own process group.
///
/// The child gets a null stdin and piped stdout/stderr. Because it leads its
/// own group, a terminal Ctrl-C aimed at the worker does not interrupt the
/// command, and a timeout can kill the whole pipeline the shell started.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

impl ShellRunner {
    /// Runner using `/bin/sh`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another POSIX shell.
    #[must_use]
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "failed to spawn job command");
                return CommandOutput::spawn_failed(e);
            }
        };
        let pid = child.id();
        debug!(pid = ?pid, "job command started");

        let wait = child.wait_with_output();
        let finished = match timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    if let Some(pid) = pid {
                        let _ = kill_group(pid);
                    }
                    warn!(pid = ?pid, timeout_secs = limit.as_secs_f64(), "job command timed out");
                    return CommandOutput::timeout(limit);
                }
            },
            None => wait.await,
        };

        match finished {
            Ok(output) => CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                timed_out: false,
            },
            Err(e) => CommandOutput::spawn_failed(e),
        }
    }
}
