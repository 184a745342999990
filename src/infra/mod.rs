//! Infrastructure adapters: job stores, the shell runner and the worker registry.

pub mod registry;
pub mod runner;
pub mod store;

pub use registry::{WorkerEntry, WorkerRegistry};
pub use runner::ShellRunner;
pub use store::{InMemoryJobStore, SqliteJobStore};
