//! SQLite-backed job store.
//!
//! Each process opens its own connection to the same database file. Claims
//! run inside an `IMMEDIATE` transaction so the "oldest pending" selection and
//! the `pending -> processing` update are serialized across processes by
//! SQLite's write lock.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use crate::core::{
    EnqueueRequest, Job, JobState, JobStore, QueueError, QueueResult, StateCounts,
};
use crate::util::clock::{format_ts, now_utc, parse_ts};

/// How long a connection waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const JOB_COLUMNS: &str =
    "id, command, state, attempts, max_retries, created_at, updated_at, last_error, result";

/// Row as stored, before timestamp and state parsing.
struct RawJob {
    id: String,
    command: String,
    state: String,
    attempts: i64,
    max_retries: i64,
    created_at: String,
    updated_at: String,
    last_error: Option<String>,
    result: Option<String>,
}

impl RawJob {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            command: row.get(1)?,
            state: row.get(2)?,
            attempts: row.get(3)?,
            max_retries: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            last_error: row.get(7)?,
            result: row.get(8)?,
        })
    }

    fn into_job(self) -> QueueResult<Job> {
        let to_u32 = |field: &str, value: i64| {
            u32::try_from(value)
                .map_err(|_| QueueError::Corrupt(format!("job {}: bad {field} {value}", self.id)))
        };
        Ok(Job {
            state: self
                .state
                .parse()
                .map_err(|_| QueueError::Corrupt(format!("job {}: bad state {}", self.id, self.state)))?,
            attempts: to_u32("attempts", self.attempts)?,
            max_retries: to_u32("max_retries", self.max_retries)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_error: self.last_error,
            result: self.result,
            command: self.command,
            id: self.id,
        })
    }
}

/// Job store persisted in a single SQLite file.
#[derive(Debug)]
pub struct SqliteJobStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the parent directory cannot be created and `Storage`
    /// if SQLite refuses to open or migrate the file.
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            path,
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        debug!(path = %store.path.display(), "job store opened");
        Ok(store)
    }

    /// Database file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn migrate(&self) -> QueueResult<()> {
        self.conn.lock().execute_batch(
            r"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS jobs (
              id TEXT PRIMARY KEY,
              command TEXT NOT NULL,
              state TEXT NOT NULL CHECK (state IN ('pending', 'processing', 'completed', 'dead')),
              attempts INTEGER NOT NULL DEFAULT 0,
              max_retries INTEGER NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              last_error TEXT,
              result TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_state_created ON jobs (state, created_at, id);
            ",
        )?;
        Ok(())
    }

    /// Move a `processing` job to `to`, writing `result` and `last_error`.
    fn finish(
        &self,
        id: &str,
        to: JobState,
        result: Option<&str>,
        last_error: Option<&str>,
    ) -> QueueResult<()> {
        JobState::Processing.check_transition(to, id)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            r"
            UPDATE jobs
            SET state=?1, result=?2, last_error=?3, updated_at=?4
            WHERE id=?5 AND state='processing'
            ",
            params![to.as_str(), result, last_error, format_ts(&now_utc()), id],
        )?;
        if changed == 1 {
            tx.commit()?;
            return Ok(());
        }
        let current: Option<String> = tx
            .query_row("SELECT state FROM jobs WHERE id=?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        match current {
            None => Err(QueueError::NotFound(id.to_string())),
            Some(state) => Err(QueueError::StateConflict {
                id: id.to_string(),
                from: state
                    .parse()
                    .map_err(|_| QueueError::Corrupt(format!("job {id}: bad state {state}")))?,
                to,
            }),
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl JobStore for SqliteJobStore {
    fn insert(&self, request: EnqueueRequest) -> QueueResult<Job> {
        let job = request.into_job(now_utc())?;
        let conn = self.conn.lock();
        let inserted = conn.execute(
            r"
            INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at, last_error, result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL)
            ",
            params![
                job.id,
                job.command,
                job.state.as_str(),
                job.attempts,
                job.max_retries,
                format_ts(&job.created_at),
                format_ts(&job.updated_at),
            ],
        );
        match inserted {
            Ok(_) => Ok(job),
            Err(err) if is_constraint_violation(&err) => Err(QueueError::Validation(format!(
                "job id already exists: {}",
                job.id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    fn claim_next(&self) -> QueueResult<Option<Job>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = tx
            .query_row(
                &format!(
                    r"
                    UPDATE jobs
                    SET state='processing', attempts=attempts + 1, updated_at=?1
                    WHERE state='pending' AND id = (
                      SELECT id FROM jobs WHERE state='pending' ORDER BY created_at, id LIMIT 1
                    )
                    RETURNING {JOB_COLUMNS}
                    "
                ),
                params![format_ts(&now_utc())],
                RawJob::read,
            )
            .optional()?;
        tx.commit()?;
        raw.map(RawJob::into_job).transpose()
    }

    fn mark_completed(&self, id: &str, result: &str) -> QueueResult<()> {
        self.finish(id, JobState::Completed, Some(result), None)
    }

    fn mark_pending_for_retry(&self, id: &str, last_error: &str) -> QueueResult<()> {
        self.finish(id, JobState::Pending, None, Some(last_error))
    }

    fn mark_dead(&self, id: &str, last_error: &str) -> QueueResult<()> {
        self.finish(id, JobState::Dead, None, Some(last_error))
    }

    fn revive(&self, id: &str) -> QueueResult<bool> {
        let changed = self.conn.lock().execute(
            r"
            UPDATE jobs
            SET state='pending', attempts=0, last_error=NULL, result=NULL, updated_at=?1
            WHERE id=?2 AND state='dead'
            ",
            params![format_ts(&now_utc()), id],
        )?;
        Ok(changed == 1)
    }

    fn get(&self, id: &str) -> QueueResult<Option<Job>> {
        let raw = self
            .conn
            .lock()
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id=?1"),
                params![id],
                RawJob::read,
            )
            .optional()?;
        raw.map(RawJob::into_job).transpose()
    }

    fn list(&self, filter: Option<JobState>) -> QueueResult<Vec<Job>> {
        let conn = self.conn.lock();
        let raws = match filter {
            Some(state) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE state=?1 ORDER BY created_at, id"
                ))?;
                let rows = stmt.query_map(params![state.as_str()], RawJob::read)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at, id"
                ))?;
                let rows = stmt.query_map([], RawJob::read)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        raws.into_iter().map(RawJob::into_job).collect()
    }

    fn counts(&self) -> QueueResult<StateCounts> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = StateCounts::default();
        for row in rows {
            let (state, n) = row?;
            let state: JobState = state
                .parse()
                .map_err(|_| QueueError::Corrupt(format!("bad state in jobs table: {state}")))?;
            counts.add(state, u64::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }
}
