//! Job store contention against a real SQLite write lock held by another
//! connection.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::TestHarness;

use schemadoc::tracker::{
    JobStatus, JobTracker, JobUpdate, RequestContext, RetryPolicy, SqliteJobStore, StoreError,
    TrackerError,
};

fn contended_tracker(harness: &TestHarness, policy: RetryPolicy) -> JobTracker {
    let db = harness.database();
    db.set_busy_timeout(Duration::ZERO).unwrap();
    JobTracker::with_policy(Arc::new(SqliteJobStore::new(db)), policy)
}

fn lock_writers(harness: &TestHarness) -> rusqlite::Connection {
    let conn = rusqlite::Connection::open(&harness.jobs_db).unwrap();
    conn.execute_batch("BEGIN IMMEDIATE").unwrap();
    conn
}

#[test]
fn test_update_gives_up_after_retry_budget() {
    let harness = TestHarness::new();
    let tracker = contended_tracker(&harness, RetryPolicy::new(3, Duration::from_millis(20)));
    tracker
        .create("busy-1", &RequestContext::default(), &harness.source_params())
        .unwrap();

    let lock = lock_writers(&harness);
    let err = tracker
        .update("busy-1", JobUpdate::new().message("blocked"))
        .unwrap_err();
    drop(lock);

    match &err {
        TrackerError::RetriesExhausted {
            operation,
            attempts,
            source,
        } => {
            assert_eq!(*operation, "update");
            assert_eq!(*attempts, 3);
            assert!(matches!(source, StoreError::Busy(_)));
        }
        other => panic!("expected exhausted retries, got {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("'update'"), "{}", message);
    assert!(message.contains("3 attempts"), "{}", message);

    // Nothing was applied.
    let job = tracker.get("busy-1").unwrap().unwrap();
    assert_eq!(job.message, "Initializing...");
}

#[test]
fn test_update_succeeds_once_lock_is_released() {
    let harness = TestHarness::new();
    let tracker = contended_tracker(&harness, RetryPolicy::new(3, Duration::from_millis(200)));
    tracker
        .create("busy-2", &RequestContext::default(), &harness.source_params())
        .unwrap();

    let lock = lock_writers(&harness);
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(250));
        lock.execute_batch("ROLLBACK").unwrap();
    });

    tracker
        .update(
            "busy-2",
            JobUpdate::new()
                .status(JobStatus::Running)
                .message("table A")
                .progress(1, 3),
        )
        .unwrap();
    releaser.join().unwrap();

    let job = tracker.get("busy-2").unwrap().unwrap();
    assert_eq!(job.message, "table A");
    assert_eq!((job.current, job.total), (1, 3));
}

#[test]
fn test_reads_are_not_blocked_by_writer() {
    let harness = TestHarness::new();
    let tracker = contended_tracker(&harness, RetryPolicy::new(1, Duration::ZERO));
    tracker
        .create("busy-3", &RequestContext::default(), &harness.source_params())
        .unwrap();

    let _lock = lock_writers(&harness);
    let job = tracker.get("busy-3").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
}
