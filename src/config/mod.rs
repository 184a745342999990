//! Configuration model and data-directory layout.

pub mod queue;

pub use queue::{QueueConfig, QueuePaths, DEFAULT_HOME, HOME_ENV};
