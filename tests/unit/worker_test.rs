//! End-to-end tests for the execution engine with real shell commands

use std::sync::Arc;
use std::time::Duration;

use queuectl::core::{
    BackoffPolicy, JobState, JobStore, Tick, Worker, WorkerSettings, MAX_OUTPUT_BYTES,
};
use queuectl::infra::{ShellRunner, SqliteJobStore};
use queuectl::util::TRUNCATION_MARKER;
use tokio_util::sync::CancellationToken;

fn fast_settings() -> WorkerSettings {
    WorkerSettings {
        poll_interval: Duration::from_millis(20),
        error_backoff: Duration::from_millis(20),
        job_timeout: Some(Duration::from_secs(5)),
        // base 0 means retries are requeued without waiting
        backoff: BackoffPolicy::new(0.0),
    }
}

fn sqlite_store(dir: &tempfile::TempDir) -> Arc<SqliteJobStore> {
    Arc::new(SqliteJobStore::open(dir.path().join("queue.db")).unwrap())
}

#[tokio::test]
async fn test_echo_job_completes_with_trimmed_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = sqlite_store(&dir);
    let id = store.enqueue("echo hello", 3).unwrap();

    let worker = Worker::new(0, Arc::clone(&store), ShellRunner::new(), fast_settings());
    let tick = worker.tick(&CancellationToken::new()).await;
    assert_eq!(tick, Tick::Completed { id: id.clone() });

    let job = store.get(&id).unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.result.as_deref(), Some("hello"));
    assert!(job.last_error.is_none());
}

#[tokio::test]
async fn test_failing_job_with_one_retry_goes_dead() {
    let dir = tempfile::tempdir().unwrap();
    let store = sqlite_store(&dir);
    let id = store.enqueue("exit 1", 1).unwrap();

    let worker = Worker::new(0, Arc::clone(&store), ShellRunner::new(), fast_settings());
    let tick = worker.tick(&CancellationToken::new()).await;
    assert_eq!(tick, Tick::Dead { id: id.clone() });

    let job = store.get(&id).unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("exit_code=1"));
    assert!(job.result.is_none());
}

#[tokio::test]
async fn test_stderr_becomes_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = sqlite_store(&dir);
    let id = store.enqueue("echo 'disk full' >&2; exit 4", 2).unwrap();

    let worker = Worker::new(0, Arc::clone(&store), ShellRunner::new(), fast_settings());
    let token = CancellationToken::new();
    assert!(matches!(worker.tick(&token).await, Tick::Retried { .. }));
    assert_eq!(
        store.get(&id).unwrap().unwrap().last_error.as_deref(),
        Some("disk full")
    );
    assert_eq!(worker.tick(&token).await, Tick::Dead { id: id.clone() });
    assert_eq!(store.get(&id).unwrap().unwrap().attempts, 2);
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = sqlite_store(&dir);
    let id = store.enqueue("sleep 10", 1).unwrap();

    let settings = WorkerSettings {
        job_timeout: Some(Duration::from_millis(200)),
        ..fast_settings()
    };
    let worker = Worker::new(0, Arc::clone(&store), ShellRunner::new(), settings);
    assert_eq!(
        worker.tick(&CancellationToken::new()).await,
        Tick::Dead { id: id.clone() }
    );
    let job = store.get(&id).unwrap().unwrap();
    assert!(job.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_large_output_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let store = sqlite_store(&dir);
    let id = store
        .enqueue("head -c 70000 /dev/zero | tr '\\0' 'a'", 1)
        .unwrap();

    let worker = Worker::new(0, Arc::clone(&store), ShellRunner::new(), fast_settings());
    assert!(matches!(
        worker.tick(&CancellationToken::new()).await,
        Tick::Completed { .. }
    ));
    let result = store.get(&id).unwrap().unwrap().result.unwrap();
    assert!(result.ends_with(TRUNCATION_MARKER));
    assert_eq!(result.len(), MAX_OUTPUT_BYTES + TRUNCATION_MARKER.len());
}

#[tokio::test]
async fn test_two_workers_share_one_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let seed = SqliteJobStore::open(&path).unwrap();
    for i in 0..6 {
        seed.enqueue(&format!("echo {i}"), 1).unwrap();
    }

    let token = CancellationToken::new();
    let mut handles = Vec::new();
    for index in 0..2 {
        let store = SqliteJobStore::open(&path).unwrap();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            let worker = Worker::new(index, store, ShellRunner::new(), fast_settings());
            worker.run(&token).await
        }));
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while seed.counts().unwrap().completed < 6 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    token.cancel();

    let mut claimed = 0;
    for handle in handles {
        claimed += handle.await.unwrap().claimed;
    }
    assert_eq!(claimed, 6);
    assert_eq!(seed.counts().unwrap().completed, 6);
}
