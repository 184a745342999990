//! Operator-facing request/response models shared by the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{EnqueueRequest, Job, JobStore, QueueError, QueueResult, StateCounts};
use crate::infra::WorkerRegistry;
use crate::util::process::is_alive;

/// JSON accepted by `enqueue`. Unlike [`EnqueueRequest`], `max_retries`
/// may be omitted so the configured default applies.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSubmission {
    /// Optional caller-chosen identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Shell command line.
    pub command: String,
    /// Optional attempt ceiling.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobSubmission {
    /// Parse a JSON object.
    ///
    /// # Errors
    ///
    /// `Validation` when the payload is not a job object.
    pub fn from_json_str(input: &str) -> QueueResult<Self> {
        serde_json::from_str(input).map_err(|e| QueueError::Validation(format!("invalid job JSON: {e}")))
    }

    /// Resolve into a store request.
    #[must_use]
    pub fn into_request(self, default_max_retries: u32) -> EnqueueRequest {
        EnqueueRequest {
            id: self.id,
            command: self.command,
            max_retries: self.max_retries.unwrap_or(default_max_retries),
        }
    }
}

/// Submit a job to `store`.
///
/// # Errors
///
/// `Validation` for malformed input or a duplicate id, `Storage` otherwise.
pub fn submit_job<S: JobStore>(
    store: &S,
    submission: JobSubmission,
    default_max_retries: u32,
) -> QueueResult<Job> {
    store.insert(submission.into_request(default_max_retries))
}

/// One registry entry with a fresh liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    /// Process id.
    pub pid: u32,
    /// Spawn time.
    pub started_at: DateTime<Utc>,
    /// Whether the pid exists right now.
    pub alive: bool,
}

/// Queue summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Jobs per state.
    pub counts: StateCounts,
    /// Registered workers.
    pub workers: Vec<WorkerStatus>,
}

impl StatusReport {
    /// Workers whose pid still exists.
    #[must_use]
    pub fn alive_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.alive).count()
    }
}

/// Collect counts and worker liveness.
///
/// # Errors
///
/// `Storage` when the store cannot be read.
pub fn status<S: JobStore>(store: &S, registry: &WorkerRegistry) -> QueueResult<StatusReport> {
    let counts = store.counts()?;
    let workers = registry
        .read()
        .into_iter()
        .map(|entry| WorkerStatus {
            alive: is_alive(entry.pid),
            pid: entry.pid,
            started_at: entry.started_at,
        })
        .collect();
    Ok(StatusReport { counts, workers })
}
