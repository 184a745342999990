//! Core queue abstractions: the job model, the store contract, and the
//! execution engine that drives jobs through their lifecycle.

pub mod backoff;
pub mod dead_letter;
pub mod error;
pub mod executor;
pub mod job;
pub mod store;
pub mod worker;

pub use backoff::{BackoffPolicy, MAX_BACKOFF};
pub use dead_letter::DeadLetterQueue;
pub use error::{AppResult, QueueError, QueueResult};
pub use executor::{CommandOutput, CommandRunner, ExecutionOutcome, MAX_OUTPUT_BYTES};
pub use job::{EnqueueRequest, Job, JobState, StateCounts, DEFAULT_MAX_RETRIES};
pub use store::JobStore;
pub use worker::{sleep_or_cancel, Tick, Worker, WorkerSettings, WorkerStats};
