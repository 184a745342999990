//! Tests for the worker pool and operator API

use std::time::Duration;

use queuectl::core::JobStore;
use queuectl::infra::{InMemoryJobStore, WorkerRegistry};
use queuectl::runtime::{status, stop_workers, JobSubmission, WorkerCommand, WorkerPool};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_pool_start_status_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkerRegistry::new(dir.path().join("workers.json"));
    let pool = WorkerPool::start(&WorkerCommand::new("sleep").arg("30"), 3, registry.clone())
        .expect("start pool");

    let store = InMemoryJobStore::new();
    let report = status(&store, &registry).unwrap();
    assert_eq!(report.workers.len(), 3);
    assert_eq!(report.alive_workers(), 3);

    let token = CancellationToken::new();
    token.cancel();
    let stopped = pool.supervise(&token, Duration::from_secs(5)).await;
    assert_eq!(stopped.signalled, 3);
    assert_eq!(stopped.killed, 0);
    assert!(status(&store, &registry).unwrap().workers.is_empty());
}

#[tokio::test]
async fn test_worker_ignoring_sigterm_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkerRegistry::new(dir.path().join("workers.json"));
    let stubborn = WorkerCommand::new("sh")
        .arg("-c")
        .arg("trap '' TERM; sleep 30");
    let pool = WorkerPool::start(&stubborn, 1, registry.clone()).unwrap();
    // give the shell time to install its trap
    tokio::time::sleep(Duration::from_millis(300)).await;

    let report = pool.stop(Duration::from_millis(300)).await;
    assert_eq!(report.killed, 1);
    assert!(!registry.path().exists());
}

#[tokio::test]
async fn test_stop_with_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkerRegistry::new(dir.path().join("workers.json"));
    let report = stop_workers(&registry, Duration::from_millis(100)).await.unwrap();
    assert_eq!(report.signalled, 0);
}

#[test]
fn test_submission_uses_configured_default() {
    let store = InMemoryJobStore::new();
    let sub = JobSubmission::from_json_str(r#"{"id":"job1","command":"sleep 2"}"#).unwrap();
    let job = queuectl::runtime::submit_job(&store, sub, 7).unwrap();
    assert_eq!(job.id, "job1");
    assert_eq!(job.max_retries, 7);
    assert!(store.get("job1").unwrap().is_some());

    let dup = JobSubmission::from_json_str(r#"{"id":"job1","command":"echo"}"#).unwrap();
    assert!(queuectl::runtime::submit_job(&store, dup, 7).is_err());
}
