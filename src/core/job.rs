//! Job record, its lifecycle states and the legal transitions between them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{QueueError, QueueResult};

/// Default retry ceiling for jobs enqueued without an explicit value.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle state of a job.
///
/// ```text
/// pending ──claim──▶ processing ──▶ completed
///    ▲                   │
///    ├──── retry ────────┤
///    │                   ▼
///    └──── revive ───── dead
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be claimed. Initial state, re-entered on retry and revival.
    Pending,
    /// Claimed by exactly one worker.
    Processing,
    /// Finished successfully. Terminal.
    Completed,
    /// Retries exhausted. Terminal until revived by an operator.
    Dead,
}

impl JobState {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Processing, Self::Completed, Self::Dead];

    /// Stable lowercase name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Dead => "dead",
        }
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Pending | Self::Dead)
                | (Self::Dead, Self::Pending)
        )
    }

    /// Validate `self -> next` for job `id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StateConflict`] when the transition is illegal.
    pub fn check_transition(self, next: Self, id: &str) -> QueueResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(QueueError::StateConflict {
                id: id.to_string(),
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "dead" => Ok(Self::Dead),
            other => Err(QueueError::Validation(format!("unknown job state `{other}`"))),
        }
    }
}

/// A durable job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, immutable.
    pub id: String,
    /// Shell command line, immutable.
    pub command: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Number of claims so far.
    pub attempts: u32,
    /// Attempt ceiling before the job is dead-lettered.
    pub max_retries: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Most recent failure summary.
    pub last_error: Option<String>,
    /// Captured stdout of the successful run.
    pub result: Option<String>,
}

impl Job {
    /// Build a fresh `pending` job from an enqueue request.
    #[must_use]
    pub fn new(id: String, command: String, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            command,
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            last_error: None,
            result: None,
        }
    }

    /// Whether another failure would still be retried rather than dead-lettered.
    #[must_use]
    pub const fn has_retries_left(&self) -> bool {
        self.attempts < self.max_retries
    }
}

/// Input for inserting a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    /// Caller-chosen identifier; a UUID v4 is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Shell command line.
    pub command: String,
    /// Attempt ceiling.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl EnqueueRequest {
    /// Request with a generated identifier.
    pub fn new(command: impl Into<String>, max_retries: u32) -> Self {
        Self {
            id: None,
            command: command.into(),
            max_retries,
        }
    }

    /// Use a caller-chosen identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Validate the request and turn it into a `pending` job.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Validation`] for an empty command or an empty id.
    pub fn into_job(self, now: DateTime<Utc>) -> QueueResult<Job> {
        if self.command.trim().is_empty() {
            return Err(QueueError::Validation("command must not be empty".into()));
        }
        let id = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(QueueError::Validation("job id must not be empty".into()));
            }
            Some(id) => id.trim().to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        Ok(Job::new(id, self.command, self.max_retries, now))
    }
}

/// Number of jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Jobs waiting to be claimed.
    pub pending: u64,
    /// Jobs currently claimed.
    pub processing: u64,
    /// Jobs finished successfully.
    pub completed: u64,
    /// Dead-lettered jobs.
    pub dead: u64,
}

impl StateCounts {
    /// Add `n` jobs in `state`.
    pub fn add(&mut self, state: JobState, n: u64) {
        match state {
            JobState::Pending => self.pending += n,
            JobState::Processing => self.processing += n,
            JobState::Completed => self.completed += n,
            JobState::Dead => self.dead += n,
        }
    }

    /// Count for one state.
    #[must_use]
    pub const fn get(&self, state: JobState) -> u64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Completed => self.completed,
            JobState::Dead => self.dead,
        }
    }

    /// Total across all states.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.dead
    }
}
