//! Tests for the job store backends

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use queuectl::core::{EnqueueRequest, JobState, JobStore, QueueError};
use queuectl::infra::{InMemoryJobStore, SqliteJobStore};

fn exercise_lifecycle<S: JobStore>(store: &S) {
    let first = store.enqueue("echo one", 2).unwrap();
    let second = store.enqueue("echo two", 2).unwrap();

    let job = store.claim_next().unwrap().expect("first job");
    assert_eq!(job.id, first);
    assert_eq!(job.state, JobState::Processing);
    assert_eq!(job.attempts, 1);

    store.mark_completed(&first, "one").unwrap();
    let done = store.get(&first).unwrap().unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.result.as_deref(), Some("one"));
    assert!(done.updated_at >= done.created_at);

    let job = store.claim_next().unwrap().expect("second job");
    assert_eq!(job.id, second);
    store.mark_dead(&second, "exit_code=1").unwrap();
    assert!(store.claim_next().unwrap().is_none());

    // completed is terminal
    let err = store.mark_pending_for_retry(&first, "late").unwrap_err();
    assert!(matches!(err, QueueError::StateConflict { .. }));
    assert!(!store.revive(&first).unwrap());

    assert!(store.revive(&second).unwrap());
    let revived = store.get(&second).unwrap().unwrap();
    assert_eq!(revived.state, JobState::Pending);
    assert_eq!(revived.attempts, 0);
    assert!(revived.last_error.is_none());

    let counts = store.counts().unwrap();
    assert_eq!((counts.pending, counts.completed, counts.total()), (1, 1, 2));
    assert_eq!(store.list(Some(JobState::Completed)).unwrap().len(), 1);
    assert_eq!(store.list(None).unwrap().len(), 2);
}

#[test]
fn test_memory_store_lifecycle() {
    exercise_lifecycle(&InMemoryJobStore::new());
}

#[test]
fn test_sqlite_store_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteJobStore::open(dir.path().join("queue.db")).unwrap();
    exercise_lifecycle(&store);
}

#[test]
fn test_sqlite_rejects_empty_command_and_duplicate_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteJobStore::open(dir.path().join("queue.db")).unwrap();

    assert!(matches!(
        store.enqueue("   ", 3),
        Err(QueueError::Validation(_))
    ));
    store
        .insert(EnqueueRequest::new("echo hi", 3).with_id("job1"))
        .unwrap();
    assert!(matches!(
        store.insert(EnqueueRequest::new("echo again", 3).with_id("job1")),
        Err(QueueError::Validation(_))
    ));
    assert_eq!(store.counts().unwrap().total(), 1);
}

#[test]
fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let id = {
        let store = SqliteJobStore::open(&path).unwrap();
        let id = store.enqueue("echo persisted", 3).unwrap();
        store.claim_next().unwrap().unwrap();
        store.mark_pending_for_retry(&id, "exit_code=2").unwrap();
        id
    };

    let store = SqliteJobStore::open(&path).unwrap();
    let job = store.get(&id).unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("exit_code=2"));
    assert_eq!(job.command, "echo persisted");
}

#[test]
fn test_sqlite_concurrent_claims_are_exclusive() {
    const JOBS: usize = 60;
    const CLAIMANTS: usize = 4;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let seed = SqliteJobStore::open(&path).unwrap();
    let mut expected = HashSet::new();
    for i in 0..JOBS {
        expected.insert(seed.enqueue(&format!("echo {i}"), 3).unwrap());
    }

    // one connection per claimant, like separate worker processes
    let stores: Vec<SqliteJobStore> = (0..CLAIMANTS)
        .map(|_| SqliteJobStore::open(&path).unwrap())
        .collect();
    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            thread::spawn(move || {
                let mut claimed = Vec::new();
                while let Some(job) = store.claim_next().unwrap() {
                    claimed.push(job.id);
                }
                claimed
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "job claimed twice");
        }
    }
    assert_eq!(seen, expected);

    let counts = seed.counts().unwrap();
    assert_eq!(counts.processing as usize, JOBS);
    assert!(seed
        .list(Some(JobState::Processing))
        .unwrap()
        .iter()
        .all(|job| job.attempts == 1));
}

#[test]
fn test_memory_concurrent_claims_are_exclusive() {
    let store = Arc::new(InMemoryJobStore::new());
    for i in 0..200 {
        store.enqueue(&format!("job {i}"), 1).unwrap();
    }
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut n = Vec::new();
                while let Some(job) = store.claim_next().unwrap() {
                    n.push(job.id);
                }
                n
            })
        })
        .collect();
    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 200);
}
