//! File-backed worker registry.
//!
//! A JSON array of `{pid, started_at}` entries. Written through a temp file and
//! a rename so readers never observe a half-written snapshot. Advisory only:
//! the job store, not this file, decides whether a job is being worked.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::QueueResult;

/// One spawned worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerEntry {
    /// Operating-system process id.
    pub pid: u32,
    /// When the pool spawned it.
    pub started_at: DateTime<Utc>,
}

/// Location of the registry snapshot.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    path: PathBuf,
}

impl WorkerRegistry {
    /// Registry stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    /// Replace the registry with `entries` atomically.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the file cannot be written or renamed.
    pub fn write(&self, entries: &[WorkerEntry]) -> QueueResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(entries)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read the registry. Missing, unreadable or corrupt files mean "no workers known".
    #[must_use]
    pub fn read(&self) -> Vec<WorkerEntry> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "worker registry unreadable");
                return Vec::new();
            }
        };
        serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "worker registry corrupt");
            Vec::new()
        })
    }

    /// Remove the registry file. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns `Io` for failures other than the file already being absent.
    pub fn remove(&self) -> QueueResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
