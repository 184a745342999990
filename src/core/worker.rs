//! Execution engine: one worker's poll → execute → resolve loop.
//!
//! A worker claims the oldest pending job, runs its command, and writes the
//! outcome back: `completed` on success, `pending` again after an
//! exponential backoff while retries remain, `dead` once they are exhausted.
//!
//! Attempts are counted at claim time, so a crash mid-execution still shows up
//! as one attempt when the job is next claimed. During the backoff sleep the
//! job deliberately stays `processing`; a crash in that window leaves it
//! stranded until an operator intervenes.
//!
//! Transient store failures are logged and retried after a short pause. A
//! store that hands back undecodable records ends this worker's loop; other
//! workers are unaffected.
//!
//! Stopping is cooperative. The loop observes a [`CancellationToken`] at the
//! top of every iteration and during every sleep; a command already running is
//! allowed to finish or hit its timeout. A stop that lands during a backoff
//! returns the job to `pending` immediately and ends the loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use queuectl::core::{Worker, WorkerSettings};
//! use queuectl::infra::{ShellRunner, SqliteJobStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = SqliteJobStore::open("queue.db")?;
//! let worker = Worker::new(0, store, ShellRunner::new(), WorkerSettings::default());
//! let stats = worker.run(&CancellationToken::new()).await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::error::{QueueError, QueueResult};
use super::executor::{CommandRunner, ExecutionOutcome};
use super::job::Job;
use super::store::JobStore;

/// Tunables for one worker loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Sleep between polls when no job is pending.
    pub poll_interval: Duration,
    /// Sleep after a failed store call before polling again.
    pub error_backoff: Duration,
    /// Wall-clock limit per command; `None` waits indefinitely.
    pub job_timeout: Option<Duration>,
    /// Delay schedule between retries.
    pub backoff: BackoffPolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
            job_timeout: Some(Duration::from_secs(30)),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// What one loop iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Nothing was pending.
    Idle,
    /// A store call failed; the worker should back off.
    StoreError,
    /// The store returned something unrecoverable; this worker must exit.
    Fatal,
    /// The job ran successfully.
    Completed {
        /// Job identifier.
        id: String,
    },
    /// The job failed and went back to `pending` after `delay`.
    Retried {
        /// Job identifier.
        id: String,
        /// Backoff that was served before requeueing.
        delay: Duration,
    },
    /// The job failed with no retries left.
    Dead {
        /// Job identifier.
        id: String,
    },
    /// A stop arrived during the backoff; the job was put back early.
    Released {
        /// Job identifier.
        id: String,
    },
}

/// Counters reported when a worker exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Jobs claimed.
    pub claimed: u64,
    /// Jobs completed.
    pub completed: u64,
    /// Jobs requeued after backoff.
    pub retried: u64,
    /// Jobs dead-lettered.
    pub dead: u64,
    /// Jobs returned early because of a stop during backoff.
    pub released: u64,
    /// Store calls that failed.
    pub store_errors: u64,
}

/// Internal counters (lock-free atomics).
#[derive(Debug, Default)]
struct WorkerCounters {
    claimed: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    dead: AtomicU64,
    released: AtomicU64,
    store_errors: AtomicU64,
}

impl WorkerCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            claimed: self.claimed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead: self.dead.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

/// Sleep for `duration` unless `shutdown` fires first. Returns `true` when the
/// full duration elapsed.
pub async fn sleep_or_cancel(shutdown: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// A single worker execution loop over a shared job store.
pub struct Worker<S, R> {
    id: usize,
    store: S,
    runner: R,
    settings: WorkerSettings,
    counters: WorkerCounters,
}

impl<S, R> Worker<S, R>
where
    S: JobStore,
    R: CommandRunner,
{
    /// Create worker number `id`.
    pub fn new(id: usize, store: S, runner: R, settings: WorkerSettings) -> Self {
        Self {
            id,
            store,
            runner,
            settings,
            counters: WorkerCounters::default(),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Poll and execute jobs until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: &CancellationToken) -> WorkerStats {
        let worker_id = self.id;
        info!(worker_id, pid = std::process::id(), "worker started");

        while !shutdown.is_cancelled() {
            match self.tick(shutdown).await {
                Tick::Idle => {
                    sleep_or_cancel(shutdown, self.settings.poll_interval).await;
                }
                Tick::StoreError => {
                    sleep_or_cancel(shutdown, self.settings.error_backoff).await;
                }
                Tick::Released { .. } | Tick::Fatal => break,
                Tick::Completed { .. } | Tick::Retried { .. } | Tick::Dead { .. } => {}
            }
        }

        let stats = self.stats();
        info!(
            worker_id,
            claimed = stats.claimed,
            completed = stats.completed,
            retried = stats.retried,
            dead = stats.dead,
            "worker shutting down"
        );
        stats
    }

    /// Run one iteration: claim at most one job and drive it to its next state.
    pub async fn tick(&self, shutdown: &CancellationToken) -> Tick {
        match self.store.claim_next() {
            Ok(Some(job)) => self.process(job, shutdown).await,
            Ok(None) => Tick::Idle,
            Err(e) if e.is_transient() => {
                WorkerCounters::bump(&self.counters.store_errors);
                warn!(worker_id = self.id, error = %e, "claim failed");
                Tick::StoreError
            }
            Err(e) => {
                WorkerCounters::bump(&self.counters.store_errors);
                error!(worker_id = self.id, error = %e, "unrecoverable store error; worker exiting");
                Tick::Fatal
            }
        }
    }

    async fn process(&self, job: Job, shutdown: &CancellationToken) -> Tick {
        WorkerCounters::bump(&self.counters.claimed);
        info!(
            worker_id = self.id,
            job_id = %job.id,
            attempt = job.attempts,
            max_retries = job.max_retries,
            "claimed job"
        );

        let output = self
            .runner
            .run(&job.command, self.settings.job_timeout)
            .await;
        match output.into_outcome() {
            ExecutionOutcome::Succeeded { output } => {
                if !self
                    .write_outcome(&job, "completed", |store| {
                        store.mark_completed(&job.id, &output)
                    })
                    .await
                {
                    return Tick::StoreError;
                }
                WorkerCounters::bump(&self.counters.completed);
                info!(worker_id = self.id, job_id = %job.id, "job completed");
                Tick::Completed { id: job.id }
            }
            ExecutionOutcome::Failed { error } => self.fail(job, error, shutdown).await,
        }
    }

    async fn fail(&self, job: Job, error: String, shutdown: &CancellationToken) -> Tick {
        warn!(worker_id = self.id, job_id = %job.id, error = %error, "job failed");

        if !job.has_retries_left() {
            if !self
                .write_outcome(&job, "dead", |store| store.mark_dead(&job.id, &error))
                .await
            {
                return Tick::StoreError;
            }
            WorkerCounters::bump(&self.counters.dead);
            warn!(
                worker_id = self.id,
                job_id = %job.id,
                attempts = job.attempts,
                "job moved to dead-letter queue"
            );
            return Tick::Dead { id: job.id };
        }

        let delay = self.settings.backoff.delay(job.attempts);
        debug!(
            worker_id = self.id,
            job_id = %job.id,
            delay_secs = delay.as_secs_f64(),
            "backing off before requeue"
        );

        if !sleep_or_cancel(shutdown, delay).await {
            // best effort: hand the job back so another worker can take it
            if let Err(e) = self.store.mark_pending_for_retry(&job.id, &error) {
                warn!(worker_id = self.id, job_id = %job.id, error = %e, "failed to release job on shutdown");
            }
            WorkerCounters::bump(&self.counters.released);
            info!(worker_id = self.id, job_id = %job.id, "stop during backoff; job released");
            return Tick::Released { id: job.id };
        }

        if !self
            .write_outcome(&job, "pending", |store| {
                store.mark_pending_for_retry(&job.id, &error)
            })
            .await
        {
            return Tick::StoreError;
        }
        WorkerCounters::bump(&self.counters.retried);
        Tick::Retried { id: job.id, delay }
    }

    /// Persist a job's outcome. A transient failure is retried once after
    /// `error_backoff`; if that also fails the job is left in `processing`.
    async fn write_outcome<F>(&self, job: &Job, target: &str, write: F) -> bool
    where
        F: Fn(&S) -> QueueResult<()>,
    {
        match write(&self.store) {
            Ok(()) => return true,
            Err(e) if e.is_transient() => {
                WorkerCounters::bump(&self.counters.store_errors);
                warn!(
                    worker_id = self.id,
                    job_id = %job.id,
                    target,
                    error = %e,
                    "outcome write failed; retrying once"
                );
                tokio::time::sleep(self.settings.error_backoff).await;
            }
            Err(e) => {
                self.outcome_write_failed(job, target, &e);
                return false;
            }
        }
        match write(&self.store) {
            Ok(()) => true,
            Err(e) => {
                self.outcome_write_failed(job, target, &e);
                false
            }
        }
    }

    fn outcome_write_failed(&self, job: &Job, target: &str, e: &QueueError) {
        WorkerCounters::bump(&self.counters.store_errors);
        error!(
            worker_id = self.id,
            job_id = %job.id,
            target,
            error = %e,
            "failed to record job outcome"
        );
    }
}
