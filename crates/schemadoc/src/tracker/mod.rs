//! Job tracking: the persisted lifecycle of each documentation run.
//!
//! [`JobTracker`] wraps a [`JobStore`] with a fixed retry policy for store
//! contention. All job mutations go through the tracker.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub mod error;
pub mod model;
pub mod store;

pub use error::{StoreError, TrackerError};
pub use model::{Job, JobStatus, JobUpdate, NewJob, RequestContext, INITIAL_MESSAGE};
pub use store::{CreateOutcome, JobStore, SqliteJobStore};

use crate::connection::ConnectionParams;

/// How often and how patiently a busy store is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Retrying front end for a [`JobStore`]. Cheap to clone.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    policy: RetryPolicy,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn JobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Records a new job in the `running` state. Creating an id that
    /// already exists changes nothing.
    pub fn create(
        &self,
        job_id: &str,
        request: &RequestContext,
        connection: &ConnectionParams,
    ) -> Result<(), TrackerError> {
        let job = NewJob {
            job_id: job_id.to_string(),
            request: request.clone(),
            connection: connection.snapshot(),
        };
        match self.with_retry("create", job_id, || self.store.create(&job))? {
            CreateOutcome::Created => {
                log::info!(
                    "Created job {} ({} connection)",
                    job_id,
                    job.connection.connection_type
                );
            }
            CreateOutcome::AlreadyExists => {
                log::warn!("Job {} already exists, ignoring duplicate create", job_id);
            }
        }
        Ok(())
    }

    /// Applies a partial update; omitted fields keep their values.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), TrackerError> {
        self.with_retry("update", job_id, || self.store.update(job_id, &update))?;
        log::debug!(
            "Job {} updated: status={:?} current={:?} total={:?}",
            job_id,
            update.status,
            update.current,
            update.total
        );
        Ok(())
    }

    /// Current snapshot of a job, `None` for unknown ids.
    pub fn get(&self, job_id: &str) -> Result<Option<Job>, TrackerError> {
        self.with_retry("get", job_id, || self.store.get(job_id))
    }

    fn with_retry<T, F>(
        &self,
        operation: &'static str,
        job_id: &str,
        mut call: F,
    ) -> Result<T, TrackerError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    log::warn!(
                        "Job store busy during {} of job {} (attempt {}/{}): {}",
                        operation,
                        job_id,
                        attempt,
                        max_attempts,
                        e
                    );
                    thread::sleep(self.policy.backoff);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    log::error!(
                        "Job store {} of job {} failed after {} attempts: {}",
                        operation,
                        job_id,
                        max_attempts,
                        e
                    );
                    return Err(TrackerError::RetriesExhausted {
                        operation,
                        attempts: max_attempts,
                        source: e,
                    });
                }
                Err(e) => return Err(TrackerError::Store(e)),
            }
        }
    }
}
