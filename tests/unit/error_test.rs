//! Tests for error types

use queuectl::core::{JobState, QueueError};

#[test]
fn test_validation_error() {
    let err = QueueError::Validation("command must not be empty".to_string());
    assert_eq!(format!("{}", err), "validation error: command must not be empty");
    assert!(!err.is_transient());
}

#[test]
fn test_state_conflict_error() {
    let err = QueueError::StateConflict {
        id: "job1".to_string(),
        from: JobState::Completed,
        to: JobState::Pending,
    };
    assert_eq!(
        format!("{}", err),
        "state conflict for job job1: cannot move completed -> pending"
    );
}

#[test]
fn test_not_found_error() {
    let err = QueueError::NotFound("job9".to_string());
    assert_eq!(format!("{}", err), "job not found: job9");
}

#[test]
fn test_storage_errors_are_transient() {
    let err = QueueError::Storage("database is locked".to_string());
    assert_eq!(format!("{}", err), "storage error: database is locked");
    assert!(err.is_transient());

    let io: QueueError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
    assert!(matches!(io, QueueError::Io(_)));
    assert!(io.is_transient());
}

#[test]
fn test_illegal_transition_is_rejected() {
    let err = JobState::Completed
        .check_transition(JobState::Processing, "job1")
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::StateConflict {
            from: JobState::Completed,
            to: JobState::Processing,
            ..
        }
    ));
    assert!(JobState::Pending
        .check_transition(JobState::Processing, "job1")
        .is_ok());
}

#[test]
fn test_corrupt_record_is_fatal() {
    let err = QueueError::Corrupt("job x: bad state running".to_string());
    assert_eq!(format!("{}", err), "corrupt record: job x: bad state running");
    assert!(!err.is_transient());
}
