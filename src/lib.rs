//! # queuectl
//!
//! A single-node, persistent background job queue for shell commands.
//!
//! Jobs are shell command lines stored in a local SQLite file. One or more
//! worker processes poll the store, atomically claim the oldest pending job,
//! run it through `sh -c`, and record the outcome. Failures are retried with
//! exponential backoff until the job's attempt budget is spent, after which
//! the job lands in a dead-letter queue where an operator can inspect and
//! revive it.
//!
//! ## Lifecycle
//!
//! ```text
//! pending --claim--> processing --success--> completed
//!    ^                   |
//!    +----retry/backoff--+--exhausted--> dead --revive--> pending
//! ```
//!
//! ## Layout
//!
//! - [`core`]: job model, the [`core::JobStore`] contract, backoff, the
//!   execution engine ([`core::Worker`]) and the dead-letter controller.
//! - [`infra`]: SQLite and in-memory stores, the shell runner, the worker registry.
//! - [`runtime`]: the process pool manager, signal handling and status reporting.
//! - [`config`]: persisted tunables and the data-directory layout.
//! - [`util`]: clock, text, process and telemetry helpers.
//!
//! ```rust,ignore
//! use queuectl::core::{JobStore, Worker, WorkerSettings};
//! use queuectl::infra::{ShellRunner, SqliteJobStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = SqliteJobStore::open(".queuectl/queuectl.db")?;
//! store.enqueue("echo hello", 3)?;
//!
//! let worker = Worker::new(0, store, ShellRunner::new(), WorkerSettings::default());
//! worker.run(&CancellationToken::new()).await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(not(unix))]
compile_error!("queuectl relies on POSIX process groups and signals and only supports Unix targets");

/// Job model, store contract, execution engine and dead-letter controller.
pub mod core;
/// Persisted configuration and data-directory layout.
pub mod config;
/// Store backends, command runner and worker registry.
pub mod infra;
/// Worker pool, signals and operator API.
pub mod runtime;
/// Shared utilities.
pub mod util;
