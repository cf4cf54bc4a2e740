//! Job repository: row-level operations for the `jobs` table.
//!
//! Functions take a `&Connection` so callers can compose them inside a
//! single transaction (see `tracker::store`).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub message: Option<String>,
    pub current: i64,
    pub total: i64,
    pub filename: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub accept_language: Option<String>,
    pub connection_type: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub service_name: Option<String>,
    pub username: Option<String>,
    pub request_data: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            status: row.get("status")?,
            message: row.get("message")?,
            current: row.get("current")?,
            total: row.get("total")?,
            filename: row.get("filename")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            user_ip: row.get("user_ip")?,
            user_agent: row.get("user_agent")?,
            referrer: row.get("referrer")?,
            accept_language: row.get("accept_language")?,
            connection_type: row.get("connection_type")?,
            host: row.get("host")?,
            port: row.get("port")?,
            service_name: row.get("service_name")?,
            username: row.get("username")?,
            request_data: row.get("request_data")?,
        })
    }
}

/// Column values to overwrite on an existing row. `None` keeps the stored value.
#[derive(Debug, Default, Clone)]
pub struct JobChanges {
    pub status: Option<String>,
    pub message: Option<String>,
    pub current: Option<i64>,
    pub total: Option<i64>,
    pub filename: Option<String>,
}

/// Inserts a job row unless one with the same id exists.
///
/// Returns `true` when a row was written, `false` when the id was taken.
pub fn insert_if_absent(conn: &Connection, job: &JobRow) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO jobs (job_id, status, message, current, total, filename,
         created_at, updated_at, user_ip, user_agent, referrer, accept_language,
         connection_type, host, port, service_name, username, request_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            job.job_id,
            job.status,
            job.message,
            job.current,
            job.total,
            job.filename,
            job.created_at,
            job.updated_at,
            job.user_ip,
            job.user_agent,
            job.referrer,
            job.accept_language,
            job.connection_type,
            job.host,
            job.port,
            job.service_name,
            job.username,
            job.request_data,
        ],
    )?;
    Ok(changed == 1)
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, job_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM jobs WHERE job_id = ?1",
            params![job_id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Applies the given changes and stamps `updated_at`.
///
/// Returns the number of rows touched (0 when the id is unknown).
pub fn apply_changes(
    conn: &Connection,
    job_id: &str,
    changes: &JobChanges,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    let mut assignments = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref status) = changes.status {
        param_values.push(Box::new(status.clone()));
        assignments.push(format!("status = ?{}", param_values.len()));
    }
    if let Some(ref message) = changes.message {
        param_values.push(Box::new(message.clone()));
        assignments.push(format!("message = ?{}", param_values.len()));
    }
    if let Some(current) = changes.current {
        param_values.push(Box::new(current));
        assignments.push(format!("current = ?{}", param_values.len()));
    }
    if let Some(total) = changes.total {
        param_values.push(Box::new(total));
        assignments.push(format!("total = ?{}", param_values.len()));
    }
    if let Some(ref filename) = changes.filename {
        param_values.push(Box::new(filename.clone()));
        assignments.push(format!("filename = ?{}", param_values.len()));
    }

    param_values.push(Box::new(updated_at.to_string()));
    assignments.push(format!("updated_at = ?{}", param_values.len()));

    param_values.push(Box::new(job_id.to_string()));
    let sql = format!(
        "UPDATE jobs SET {} WHERE job_id = ?{}",
        assignments.join(", "),
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let changed = conn.execute(&sql, params_ref.as_slice())?;
    Ok(changed)
}
