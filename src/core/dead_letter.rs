//! Dead-letter queue: inspection and manual revival of exhausted jobs.

use tracing::{info, warn};

use super::job::{Job, JobState};
use super::store::JobStore;
use super::QueueResult;

/// Operator view over the `dead` partition of a [`JobStore`].
#[derive(Debug, Clone)]
pub struct DeadLetterQueue<S> {
    store: S,
}

impl<S: JobStore> DeadLetterQueue<S> {
    /// Wrap `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// All dead jobs, most recently updated first.
    ///
    /// # Errors
    ///
    /// `Storage` when the store cannot be read.
    pub fn list_dead(&self) -> QueueResult<Vec<Job>> {
        let mut jobs = self.store.list(Some(JobState::Dead))?;
        jobs.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(jobs)
    }

    /// Move one dead job back to `pending` with a fresh attempt budget.
    ///
    /// Returns `false` when the job is missing or not dead.
    ///
    /// # Errors
    ///
    /// `Storage` when the store cannot be written.
    pub fn retry_one(&self, id: &str) -> QueueResult<bool> {
        let revived = self.store.revive(id)?;
        if revived {
            info!(job_id = %id, "dead job revived");
        } else {
            warn!(job_id = %id, "not in dead-letter queue");
        }
        Ok(revived)
    }

    /// Revive every job that is dead right now. Returns how many were revived.
    ///
    /// Jobs that leave `dead` concurrently are skipped, not counted.
    ///
    /// # Errors
    ///
    /// `Storage` when the store cannot be read or written.
    pub fn retry_all(&self) -> QueueResult<usize> {
        let mut revived = 0;
        for job in self.store.list(Some(JobState::Dead))? {
            if self.store.revive(&job.id)? {
                revived += 1;
            }
        }
        info!(revived, "dead-letter queue retried");
        Ok(revived)
    }
}
