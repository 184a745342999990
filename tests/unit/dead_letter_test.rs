//! Tests for the dead-letter queue over the SQLite store

use std::time::Duration;

use queuectl::core::{DeadLetterQueue, JobState, JobStore};
use queuectl::infra::SqliteJobStore;

fn dead_job(store: &SqliteJobStore, command: &str) -> String {
    let id = store.enqueue(command, 1).unwrap();
    let claimed = store.claim_next().unwrap().unwrap();
    assert_eq!(claimed.id, id);
    store.mark_dead(&id, "exit_code=1").unwrap();
    id
}

#[test]
fn test_list_and_retry_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteJobStore::open(dir.path().join("queue.db")).unwrap();
    let older = dead_job(&store, "false");
    std::thread::sleep(Duration::from_millis(5));
    let newer = dead_job(&store, "exit 2");

    let dlq = DeadLetterQueue::new(&store);
    let ids: Vec<String> = dlq.list_dead().unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, [newer.clone(), older.clone()]);

    assert!(dlq.retry_one(&older).unwrap());
    let job = store.get(&older).unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.last_error.is_none());

    // a revived job is claimable again with a fresh budget
    let reclaimed = store.claim_next().unwrap().unwrap();
    assert_eq!(reclaimed.id, older);
    assert_eq!(reclaimed.attempts, 1);

    assert!(!dlq.retry_one(&older).unwrap());
    assert!(!dlq.retry_one("no-such-job").unwrap());
    assert_eq!(dlq.list_dead().unwrap().len(), 1);
}

#[test]
fn test_retry_all() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteJobStore::open(dir.path().join("queue.db")).unwrap();
    for i in 0..3 {
        dead_job(&store, &format!("exit {}", i + 1));
    }
    let dlq = DeadLetterQueue::new(&store);
    assert_eq!(dlq.retry_all().unwrap(), 3);
    assert_eq!(dlq.retry_all().unwrap(), 0);
    let counts = store.counts().unwrap();
    assert_eq!((counts.pending, counts.dead), (3, 0));
}
