//! Job store capability and its SQLite implementation.
//!
//! The store enforces the job lifecycle: terminal jobs are frozen, a
//! filename accompanies exactly the `completed` transition, progress never
//! moves backwards (except when a job fails) and `updated_at` strictly
//! increases on every write.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use rusqlite::Connection;

use super::error::StoreError;
use super::model::{Job, JobStatus, JobUpdate, NewJob, RequestContext, INITIAL_MESSAGE};
use crate::connection::ConnectionSnapshot;
use crate::db::job_repo::{self, JobChanges, JobRow};
use crate::db::{Database, DatabaseError};

/// Result of [`JobStore::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Persistence for job records. Implementations report contention as
/// [`StoreError::Busy`] so callers can retry.
pub trait JobStore: Send + Sync {
    fn create(&self, job: &NewJob) -> Result<CreateOutcome, StoreError>;
    fn update(&self, job_id: &str, update: &JobUpdate) -> Result<(), StoreError>;
    fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError>;
}

/// [`JobStore`] backed by the `jobs` table.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the database file, running migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path)?))
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // `datetime('now')` style, written by hand or by older tooling.
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Current time, nudged past `previous` when the clock has not advanced.
fn next_timestamp(previous: &str) -> DateTime<Utc> {
    // Stored with microsecond precision; compare at the same precision.
    let now = Utc::now().trunc_subsecs(6);
    match parse_timestamp(previous) {
        Some(prev) if now <= prev => prev + TimeDelta::microseconds(1),
        _ => now,
    }
}

fn to_column(job_id: &str, field: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidUpdate {
        job_id: job_id.to_string(),
        reason: format!("{} {} is out of range", field, value),
    })
}

fn validate(
    row: &JobRow,
    status: JobStatus,
    update: &JobUpdate,
) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidUpdate {
        job_id: row.job_id.clone(),
        reason,
    };

    if status.is_terminal() {
        return Err(StoreError::Terminal {
            job_id: row.job_id.clone(),
            status,
        });
    }

    let next_status = update.status.unwrap_or(status);
    if update.filename.is_some() && next_status != JobStatus::Completed {
        return Err(invalid(format!(
            "filename may only be set together with status completed (got {})",
            next_status
        )));
    }
    if next_status == JobStatus::Completed && update.filename.is_none() && row.filename.is_none() {
        return Err(invalid("status completed requires a filename".to_string()));
    }

    let current = match update.current {
        Some(c) => to_column(&row.job_id, "current", c)?,
        None => row.current,
    };
    let total = match update.total {
        Some(t) => to_column(&row.job_id, "total", t)?,
        None => row.total,
    };

    if current < row.current && next_status != JobStatus::Error {
        return Err(invalid(format!(
            "progress may not move backwards ({} < {})",
            current, row.current
        )));
    }
    if row.total != 0 && total != row.total {
        return Err(invalid(format!("total is already fixed at {}", row.total)));
    }
    if total != 0 && current > total {
        return Err(invalid(format!(
            "current {} exceeds total {}",
            current, total
        )));
    }

    Ok(())
}

fn update_in(conn: &Connection, job_id: &str, update: &JobUpdate) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;

    let row = job_repo::find_by_id(&tx, job_id)?
        .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
    let status: JobStatus = row.status.parse().map_err(|reason| StoreError::Corrupt {
        job_id: job_id.to_string(),
        reason,
    })?;

    validate(&row, status, update)?;

    let changes = JobChanges {
        status: update.status.map(|s| s.as_str().to_string()),
        message: update.message.clone(),
        current: update.current.map(|c| c as i64),
        total: update.total.map(|t| t as i64),
        filename: update.filename.clone(),
    };
    let updated_at = format_timestamp(next_timestamp(&row.updated_at));
    job_repo::apply_changes(&tx, job_id, &changes, &updated_at)?;

    tx.commit()?;
    Ok(())
}

fn job_from_row(row: JobRow) -> Result<Job, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        job_id: row.job_id.clone(),
        reason,
    };

    let status: JobStatus = row.status.parse().map_err(corrupt)?;
    let created_at = parse_timestamp(&row.created_at)
        .ok_or_else(|| corrupt(format!("bad created_at '{}'", row.created_at)))?;
    let updated_at = parse_timestamp(&row.updated_at)
        .ok_or_else(|| corrupt(format!("bad updated_at '{}'", row.updated_at)))?;
    let current = u64::try_from(row.current)
        .map_err(|_| corrupt(format!("negative current {}", row.current)))?;
    let total =
        u64::try_from(row.total).map_err(|_| corrupt(format!("negative total {}", row.total)))?;

    let connection = match row.request_data.as_deref() {
        Some(data) => match serde_json::from_str::<ConnectionSnapshot>(data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!("Ignoring unreadable request_data for job {}: {}", row.job_id, e);
                None
            }
        },
        None => None,
    };

    Ok(Job {
        job_id: row.job_id,
        status,
        message: row.message.unwrap_or_default(),
        current,
        total,
        filename: row.filename,
        created_at,
        updated_at,
        request: RequestContext {
            ip: row.user_ip,
            user_agent: row.user_agent,
            referrer: row.referrer,
            accept_language: row.accept_language,
        },
        connection,
    })
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: &NewJob) -> Result<CreateOutcome, StoreError> {
        let now = format_timestamp(Utc::now().trunc_subsecs(6));
        let snapshot = &job.connection;
        let row = JobRow {
            job_id: job.job_id.clone(),
            status: JobStatus::Running.as_str().to_string(),
            message: Some(INITIAL_MESSAGE.to_string()),
            current: 0,
            total: 0,
            filename: None,
            created_at: now.clone(),
            updated_at: now,
            user_ip: job.request.ip.clone(),
            user_agent: job.request.user_agent.clone(),
            referrer: job.request.referrer.clone(),
            accept_language: job.request.accept_language.clone(),
            connection_type: Some(snapshot.connection_type.as_str().to_string()),
            host: snapshot.host.clone(),
            port: snapshot.port.map(i64::from),
            service_name: snapshot.service_name.clone(),
            username: snapshot.username.clone(),
            request_data: Some(serde_json::to_string(snapshot)?),
        };

        let inserted = self
            .db
            .with_conn(|conn| job_repo::insert_if_absent(conn, &row))?;
        Ok(if inserted {
            CreateOutcome::Created
        } else {
            CreateOutcome::AlreadyExists
        })
    }

    fn update(&self, job_id: &str, update: &JobUpdate) -> Result<(), StoreError> {
        self.db
            .with_conn(|conn| Ok(update_in(conn, job_id, update)))?
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let row = self
            .db
            .with_conn(|conn| job_repo::find_by_id(conn, job_id))?;
        row.map(job_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionKind;

    fn test_store() -> SqliteJobStore {
        SqliteJobStore::new(Database::open_in_memory().expect("Failed to create test database"))
    }

    fn new_job(id: &str) -> NewJob {
        NewJob {
            job_id: id.to_string(),
            request: RequestContext {
                ip: Some("203.0.113.9".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
                referrer: None,
                accept_language: Some("de-CH".to_string()),
            },
            connection: ConnectionSnapshot {
                connection_type: ConnectionKind::Basic,
                host: Some("db.internal".to_string()),
                port: Some(1521),
                service_name: Some("ORCLPDB1".to_string()),
                username: Some("scott".to_string()),
            },
        }
    }

    #[test]
    fn test_create_initial_state() {
        let store = test_store();
        assert_eq!(store.create(&new_job("j1")).unwrap(), CreateOutcome::Created);

        let job = store.get("j1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.message, INITIAL_MESSAGE);
        assert_eq!((job.current, job.total), (0, 0));
        assert!(job.filename.is_none());
        assert_eq!(job.created_at, job.updated_at);
        assert_eq!(job.request.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(job.connection, Some(new_job("j1").connection));
    }

    #[test]
    fn test_create_twice_leaves_row_unchanged() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        store
            .update("j1", &JobUpdate::new().message("table A").progress(1, 3))
            .unwrap();
        let before = store.get("j1").unwrap().unwrap();

        let mut again = new_job("j1");
        again.request.ip = Some("198.51.100.1".to_string());
        assert_eq!(store.create(&again).unwrap(), CreateOutcome::AlreadyExists);

        assert_eq!(store.get("j1").unwrap().unwrap(), before);
    }

    #[test]
    fn test_disjoint_updates_merge() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        store.update("j1", &JobUpdate::new().total(4)).unwrap();
        store.update("j1", &JobUpdate::new().message("table B")).unwrap();
        store.update("j1", &JobUpdate::new().current(2)).unwrap();

        let job = store.get("j1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.message, "table B");
        assert_eq!((job.current, job.total), (2, 4));
    }

    #[test]
    fn test_updated_at_strictly_increases() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        let mut last = store.get("j1").unwrap().unwrap().updated_at;
        for i in 1..=20 {
            store.update("j1", &JobUpdate::new().current(i)).unwrap();
            let job = store.get("j1").unwrap().unwrap();
            assert!(job.updated_at > last, "update {} did not advance", i);
            last = job.updated_at;
        }
    }

    #[test]
    fn test_terminal_job_rejects_updates() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        store
            .update(
                "j1",
                &JobUpdate::new()
                    .status(JobStatus::Completed)
                    .filename("report.docx"),
            )
            .unwrap();

        let err = store
            .update("j1", &JobUpdate::new().message("late"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Terminal {
                status: JobStatus::Completed,
                ..
            }
        ));
        assert_eq!(store.get("j1").unwrap().unwrap().message, INITIAL_MESSAGE);
    }

    #[test]
    fn test_filename_requires_completed() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();

        let err = store
            .update("j1", &JobUpdate::new().filename("early.docx"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate { .. }));

        let err = store
            .update("j1", &JobUpdate::new().status(JobStatus::Completed))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate { .. }));

        assert!(store.get("j1").unwrap().unwrap().filename.is_none());
    }

    #[test]
    fn test_progress_cannot_move_backwards_unless_failing() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        store.update("j1", &JobUpdate::new().progress(2, 3)).unwrap();

        assert!(store.update("j1", &JobUpdate::new().current(1)).is_err());

        store
            .update(
                "j1",
                &JobUpdate::new()
                    .status(JobStatus::Error)
                    .message("Error: boom")
                    .current(0),
            )
            .unwrap();
        let job = store.get("j1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.current, 0);
        assert_eq!(job.total, 3);
    }

    #[test]
    fn test_total_fixed_once_known() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        store.update("j1", &JobUpdate::new().total(5)).unwrap();
        store.update("j1", &JobUpdate::new().total(5)).unwrap();
        assert!(store.update("j1", &JobUpdate::new().total(6)).is_err());
        assert!(store.update("j1", &JobUpdate::new().current(6)).is_err());
    }

    #[test]
    fn test_update_unknown_job() {
        let store = test_store();
        let err = store
            .update("ghost", &JobUpdate::new().message("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_get_unknown_job_is_none() {
        let store = test_store();
        assert!(store.get("ghost").unwrap().is_none());
    }

    #[test]
    fn test_request_data_has_no_password_column_or_field() {
        let store = test_store();
        store.create(&new_job("j1")).unwrap();
        let data: String = store
            .db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT request_data FROM jobs WHERE job_id = 'j1'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["connection_type"], "basic");
        assert!(value.get("password").is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2026-01-01T00:00:00.000000Z").is_some());
        assert!(parse_timestamp("2026-01-01T00:00:00.123Z").is_some());
        assert!(parse_timestamp("2026-01-01 00:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_next_timestamp_moves_past_future_previous() {
        let future = format_timestamp(Utc::now() + TimeDelta::seconds(60));
        let next = next_timestamp(&future);
        assert_eq!(next, parse_timestamp(&future).unwrap() + TimeDelta::microseconds(1));
    }
}
