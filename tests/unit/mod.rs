//! Unit tests for individual components

mod config_test;
mod dead_letter_test;
mod error_test;
mod runtime_test;
mod store_test;
mod util_test;
mod worker_test;
