//! Job store abstraction shared by every backend.

use std::sync::Arc;

use super::error::QueueResult;
use super::job::{EnqueueRequest, Job, JobState, StateCounts};

/// Abstraction for durable job storage.
///
/// The store is the single synchronization point between workers: every
/// mutating method is one atomic step, and [`JobStore::claim_next`] must never
/// hand the same job to two concurrent callers.
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty command or a duplicate id, `Storage` on I/O failure.
    fn insert(&self, request: EnqueueRequest) -> QueueResult<Job>;

    /// Enqueue `command` with a generated id and return that id.
    ///
    /// # Errors
    ///
    /// Same as [`JobStore::insert`].
    fn enqueue(&self, command: &str, max_retries: u32) -> QueueResult<String> {
        self.insert(EnqueueRequest::new(command, max_retries))
            .map(|job| job.id)
    }

    /// Atomically claim the oldest pending job (by `created_at`, then `id`),
    /// moving it to `processing` and incrementing `attempts`.
    ///
    /// # Errors
    ///
    /// `Storage` on I/O failure.
    fn claim_next(&self) -> QueueResult<Option<Job>>;

    /// `processing -> completed`, storing `result` and clearing `last_error`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `StateConflict` if the job is not processing, or `Storage`.
    fn mark_completed(&self, id: &str, result: &str) -> QueueResult<()>;

    /// `processing -> pending`, storing `last_error`. `attempts` is untouched.
    ///
    /// # Errors
    ///
    /// `NotFound`, `StateConflict` if the job is not processing, or `Storage`.
    fn mark_pending_for_retry(&self, id: &str, last_error: &str) -> QueueResult<()>;

    /// `processing -> dead`, storing `last_error`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `StateConflict` if the job is not processing, or `Storage`.
    fn mark_dead(&self, id: &str, last_error: &str) -> QueueResult<()>;

    /// `dead -> pending`, resetting `attempts` and clearing `last_error`.
    /// Returns `false` without mutating anything when the job is not dead.
    ///
    /// # Errors
    ///
    /// `Storage` on I/O failure.
    fn revive(&self, id: &str) -> QueueResult<bool>;

    /// Look up one job.
    ///
    /// # Errors
    ///
    /// `Storage` on I/O failure.
    fn get(&self, id: &str) -> QueueResult<Option<Job>>;

    /// Snapshot of jobs, optionally filtered by state, oldest first.
    ///
    /// # Errors
    ///
    /// `Storage` on I/O failure.
    fn list(&self, state: Option<JobState>) -> QueueResult<Vec<Job>>;

    /// Number of jobs per state.
    ///
    /// # Errors
    ///
    /// `Storage` on I/O failure.
    fn counts(&self) -> QueueResult<StateCounts>;
}

macro_rules! forward_job_store {
    ($($ptr:ty),+ $(,)?) => {$(
        impl<S: JobStore + ?Sized> JobStore for $ptr {
            fn insert(&self, request: EnqueueRequest) -> QueueResult<Job> {
                (**self).insert(request)
            }

            fn claim_next(&self) -> QueueResult<Option<Job>> {
                (**self).claim_next()
            }

            fn mark_completed(&self, id: &str, result: &str) -> QueueResult<()> {
                (**self).mark_completed(id, result)
            }

            fn mark_pending_for_retry(&self, id: &str, last_error: &str) -> QueueResult<()> {
                (**self).mark_pending_for_retry(id, last_error)
            }

            fn mark_dead(&self, id: &str, last_error: &str) -> QueueResult<()> {
                (**self).mark_dead(id, last_error)
            }

            fn revive(&self, id: &str) -> QueueResult<bool> {
                (**self).revive(id)
            }

            fn get(&self, id: &str) -> QueueResult<Option<Job>> {
                (**self).get(id)
            }

            fn list(&self, state: Option<JobState>) -> QueueResult<Vec<Job>> {
                (**self).list(state)
            }

            fn counts(&self) -> QueueResult<StateCounts> {
                (**self).counts()
            }
        }
    )+};
}

forward_job_store!(&S, Arc<S>, Box<S>);
