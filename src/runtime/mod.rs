//! Process-level runtime: worker pool, signal handling, and the operator API.

pub mod api;
pub mod pool;
pub mod signals;

pub use api::{status, submit_job, JobSubmission, StatusReport, WorkerStatus};
pub use pool::{stop_workers, StopReport, WorkerCommand, WorkerPool, WORKER_INDEX_ENV};
pub use signals::shutdown_token;
