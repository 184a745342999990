//! Job store backends.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryJobStore;
pub use sqlite::SqliteJobStore;
