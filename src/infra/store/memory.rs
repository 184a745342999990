//! In-memory job store ordered by creation time.
//!
//! Not durable across restarts; intended for tests and embedding. Every
//! operation runs under one mutex, which makes claim trivially atomic.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::{
    EnqueueRequest, Job, JobState, JobStore, QueueError, QueueResult, StateCounts,
};
use crate::util::clock::now_utc;

/// Claim order key: oldest `created_at` first, then `id`.
type PendingKey = (DateTime<Utc>, String);

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<String, Job>,
    /// Index of pending jobs; the first element is the next claim.
    pending: BTreeSet<PendingKey>,
}

impl MemoryState {
    fn finish(
        &mut self,
        id: &str,
        to: JobState,
        apply: impl FnOnce(&mut Job),
    ) -> QueueResult<()> {
        let job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        // finishing always starts from `processing`
        if job.state != JobState::Processing {
            return Err(QueueError::StateConflict {
                id: id.to_string(),
                from: job.state,
                to,
            });
        }
        job.state.check_transition(to, id)?;
        job.state = to;
        job.updated_at = now_utc();
        apply(job);
        if to == JobState::Pending {
            self.pending.insert((job.created_at, job.id.clone()));
        }
        Ok(())
    }
}

/// In-memory job store.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<MemoryState>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Whether the store holds no jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_by_creation(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, request: EnqueueRequest) -> QueueResult<Job> {
        let job = request.into_job(now_utc())?;
        let mut state = self.state.lock();
        if state.jobs.contains_key(&job.id) {
            return Err(QueueError::Validation(format!(
                "job id already exists: {}",
                job.id
            )));
        }
        state.pending.insert((job.created_at, job.id.clone()));
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn claim_next(&self) -> QueueResult<Option<Job>> {
        let mut state = self.state.lock();
        let Some((_, id)) = state.pending.pop_first() else {
            return Ok(None);
        };
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| QueueError::Corrupt(format!("pending index points at missing job {id}")))?;
        job.state = JobState::Processing;
        job.attempts += 1;
        job.updated_at = now_utc();
        Ok(Some(job.clone()))
    }

    fn mark_completed(&self, id: &str, result: &str) -> QueueResult<()> {
        self.state.lock().finish(id, JobState::Completed, |job| {
            job.result = Some(result.to_string());
            job.last_error = None;
        })
    }

    fn mark_pending_for_retry(&self, id: &str, last_error: &str) -> QueueResult<()> {
        self.state.lock().finish(id, JobState::Pending, |job| {
            job.last_error = Some(last_error.to_string());
        })
    }

    fn mark_dead(&self, id: &str, last_error: &str) -> QueueResult<()> {
        self.state.lock().finish(id, JobState::Dead, |job| {
            job.last_error = Some(last_error.to_string());
        })
    }

    fn revive(&self, id: &str) -> QueueResult<bool> {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(id) else {
            return Ok(false);
        };
        if job.state != JobState::Dead {
            return Ok(false);
        }
        job.state.check_transition(JobState::Pending, id)?;
        job.state = JobState::Pending;
        job.attempts = 0;
        job.last_error = None;
        job.result = None;
        job.updated_at = now_utc();
        let key = (job.created_at, job.id.clone());
        state.pending.insert(key);
        Ok(true)
    }

    fn get(&self, id: &str) -> QueueResult<Option<Job>> {
        Ok(self.state.lock().jobs.get(id).cloned())
    }

    fn list(&self, filter: Option<JobState>) -> QueueResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state
            .lock()
            .jobs
            .values()
            .filter(|job| filter.is_none_or(|s| job.state == s))
            .cloned()
            .collect();
        sort_by_creation(&mut jobs);
        Ok(jobs)
    }

    fn counts(&self) -> QueueResult<StateCounts> {
        let mut counts = StateCounts::default();
        for job in self.state.lock().jobs.values() {
            counts.add(job.state, 1);
        }
        Ok(counts)
    }
}
