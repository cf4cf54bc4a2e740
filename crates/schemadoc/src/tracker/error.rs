//! Job store and tracker error types.

use thiserror::Error;

use super::model::JobStatus;
use crate::db::DatabaseError;

/// Errors from a single job store call.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another writer holds the store; the call may succeed if repeated.
    #[error("Job store busy: {0}")]
    Busy(#[source] DatabaseError),

    #[error(transparent)]
    Database(DatabaseError),

    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Job '{job_id}' is already {status}")]
    Terminal { job_id: String, status: JobStatus },

    #[error("Invalid update for job '{job_id}': {reason}")]
    InvalidUpdate { job_id: String, reason: String },

    #[error("Corrupt job row '{job_id}': {reason}")]
    Corrupt { job_id: String, reason: String },

    #[error("Failed to serialize request data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same call can help.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        if e.is_busy() {
            StoreError::Busy(e)
        } else {
            StoreError::Database(e)
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        DatabaseError::from(e).into()
    }
}

/// Errors surfaced by [`super::JobTracker`].
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Job store operation '{operation}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TrackerError {
    /// The underlying store error, whether or not retries were attempted.
    pub fn store_error(&self) -> &StoreError {
        match self {
            TrackerError::RetriesExhausted { source, .. } => source,
            TrackerError::Store(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy() -> DatabaseError {
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        ))
    }

    #[test]
    fn test_busy_database_error_becomes_transient() {
        let err = StoreError::from(busy());
        assert!(err.is_transient());
    }

    #[test]
    fn test_validation_errors_are_not_transient() {
        assert!(!StoreError::NotFound("x".into()).is_transient());
        assert!(!StoreError::Terminal {
            job_id: "x".into(),
            status: JobStatus::Completed
        }
        .is_transient());
        assert!(!StoreError::from(DatabaseError::LockPoisoned).is_transient());
    }

    #[test]
    fn test_exhausted_message_names_operation_and_attempts() {
        let err = TrackerError::RetriesExhausted {
            operation: "update",
            attempts: 3,
            source: StoreError::from(busy()),
        };
        let msg = err.to_string();
        assert!(msg.contains("'update'"));
        assert!(msg.contains("3 attempts"));
        assert!(err.store_error().is_transient());
    }
}
