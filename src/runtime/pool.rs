//! Worker pool manager: spawns worker processes, records them in the
//! registry, and stops them again.
//!
//! Each worker is an independent OS process running its own execution loop
//! against the shared store; the pool holds no job state. Stopping is a
//! two-step escalation: SIGTERM, a grace period, then SIGKILL for survivors.
//! A worker killed mid-job leaves that job in `processing`.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{QueueError, QueueResult};
use crate::infra::{WorkerEntry, WorkerRegistry};
use crate::util::clock::now_utc;
use crate::util::process::{self, SignalDelivery};

/// Environment variable carrying a worker's index within its pool.
pub const WORKER_INDEX_ENV: &str = "QUEUECTL_WORKER_INDEX";

const REAP_INTERVAL: Duration = Duration::from_millis(100);

/// How to launch one worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    /// Launch `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Re-invoke the running binary in worker mode against `home`.
    ///
    /// # Errors
    ///
    /// `Io` if the current executable cannot be located.
    pub fn current_exe(home: &Path) -> QueueResult<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe)
            .arg("--home")
            .arg(home)
            .arg("worker")
            .arg("run"))
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    fn spawn(&self, index: usize) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_INDEX_ENV, index.to_string())
            .stdin(Stdio::null())
            .spawn()
    }
}

/// Summary of a stop sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Workers that received SIGTERM.
    pub signalled: usize,
    /// Workers that exited within the grace period.
    pub exited: usize,
    /// Workers that had to be SIGKILLed.
    pub killed: usize,
}

/// Worker processes owned by this process.
#[derive(Debug)]
pub struct WorkerPool {
    registry: WorkerRegistry,
    children: Vec<Child>,
    entries: Vec<WorkerEntry>,
}

impl WorkerPool {
    /// Spawn `count` workers and publish them to `registry`.
    ///
    /// If any spawn fails, the workers already started are killed.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero count, `Execution` if a worker cannot be spawned,
    /// `Io` if the registry write fails.
    pub fn start(
        command: &WorkerCommand,
        count: usize,
        registry: WorkerRegistry,
    ) -> QueueResult<Self> {
        if count == 0 {
            return Err(QueueError::Validation(
                "worker count must be greater than 0".into(),
            ));
        }

        let mut pool = Self {
            registry,
            children: Vec::with_capacity(count),
            entries: Vec::with_capacity(count),
        };
        for index in 0..count {
            match command.spawn(index) {
                Ok(child) => {
                    debug!(worker_id = index, pid = child.id(), "worker spawned");
                    pool.entries.push(WorkerEntry {
                        pid: child.id(),
                        started_at: now_utc(),
                    });
                    pool.children.push(child);
                }
                Err(e) => {
                    warn!(worker_id = index, error = %e, "failed to spawn worker");
                    pool.abort();
                    return Err(QueueError::Execution(format!(
                        "failed to spawn worker {index}: {e}"
                    )));
                }
            }
        }

        if let Err(e) = pool.registry.write(&pool.entries) {
            pool.abort();
            return Err(e);
        }
        info!(count, registry = %pool.registry.path().display(), "worker pool started");
        Ok(pool)
    }

    /// Registry entries for the spawned workers.
    #[must_use]
    pub fn entries(&self) -> &[WorkerEntry] {
        &self.entries
    }

    /// Number of workers still running.
    pub fn running(&mut self) -> usize {
        self.reap();
        self.children.len()
    }

    /// Wait until every worker exits on its own or `shutdown` fires, then
    /// stop whatever is left and remove the registry.
    pub async fn supervise(
        mut self,
        shutdown: &CancellationToken,
        grace: Duration,
    ) -> StopReport {
        loop {
            if self.running() == 0 {
                info!("all workers exited");
                break;
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(REAP_INTERVAL) => {}
            }
        }
        self.stop(grace).await
    }

    /// SIGTERM every live worker, wait up to `grace`, SIGKILL the rest,
    /// and remove the registry.
    pub async fn stop(mut self, grace: Duration) -> StopReport {
        self.reap();
        let mut report = StopReport::default();
        for child in &self.children {
            if process::terminate(child.id()) == SignalDelivery::Sent {
                report.signalled += 1;
            }
        }

        let deadline = Instant::now() + grace;
        while !self.children.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(REAP_INTERVAL).await;
            report.exited += self.reap();
        }

        for mut child in self.children.drain(..) {
            warn!(pid = child.id(), "worker ignored SIGTERM; killing");
            if child.kill().is_ok() {
                report.killed += 1;
            }
            let _ = child.wait();
        }

        if let Err(e) = self.registry.remove() {
            warn!(error = %e, "failed to remove worker registry");
        }
        info!(
            signalled = report.signalled,
            exited = report.exited,
            killed = report.killed,
            "worker pool stopped"
        );
        report
    }

    /// Collect exited children; returns how many were reaped.
    fn reap(&mut self) -> usize {
        let before = self.children.len();
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "worker exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "failed to poll worker");
                true
            }
        });
        before - self.children.len()
    }

    fn abort(&mut self) {
        for mut child in self.children.drain(..) {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Stop workers recorded in `registry` by another process.
///
/// Pids that no longer exist are skipped. The registry is removed afterwards
/// whatever the outcome.
///
/// # Errors
///
/// `Io` if the registry file cannot be removed.
pub async fn stop_workers(registry: &WorkerRegistry, grace: Duration) -> QueueResult<StopReport> {
    let entries = registry.read();
    let mut report = StopReport::default();
    let mut live = Vec::with_capacity(entries.len());

    for entry in &entries {
        match process::terminate(entry.pid) {
            SignalDelivery::Sent => {
                report.signalled += 1;
                live.push(entry.pid);
            }
            SignalDelivery::Denied => {
                warn!(pid = entry.pid, "not permitted to signal worker");
            }
            SignalDelivery::Gone => debug!(pid = entry.pid, "worker already gone"),
        }
    }

    let deadline = Instant::now() + grace;
    while !live.is_empty() && Instant::now() < deadline {
        tokio::time::sleep(REAP_INTERVAL).await;
        let before = live.len();
        live.retain(|pid| process::is_alive(*pid));
        report.exited += before - live.len();
    }

    for pid in live {
        if process::kill(pid) == SignalDelivery::Sent {
            warn!(pid, "worker ignored SIGTERM; killed");
            report.killed += 1;
        }
    }

    registry.remove()?;
    Ok(report)
}
