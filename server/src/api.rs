//! HTTP handlers.
//!
//! Tracker and reader calls block (SQLite, retry backoff, source database
//! I/O) and run on the blocking pool.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use schemadoc::report::DOCX_MIME_TYPE;
use schemadoc::sanitize::{is_safe_filename, resolve_within};
use schemadoc::tracker::{Job, JobStatus, JobUpdate, StoreError, TrackerError};
use schemadoc::{ConnectionForm, ConnectionParams};

use crate::client::ClientContext;
use crate::error::ApiError;
use crate::page::INDEX_HTML;
use crate::state::{AppState, SharedState};

pub const STARTING_MESSAGE: &str = "Starting documentation generation...";

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Background task failed: {}", e)))?
}

fn tracker_failure(e: TrackerError) -> ApiError {
    match e.store_error() {
        StoreError::Terminal { .. } | StoreError::InvalidUpdate { .. } => {
            ApiError::Conflict(format!("Error: {}", e))
        }
        _ => ApiError::Internal(format!("Error: {}", e)),
    }
}

fn require_job_id(job_id: Option<String>) -> Result<String, ApiError> {
    job_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing job_id".to_string()))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> &'static str {
    "OK"
}

/// Web clients may only name SQLite files under the configured root.
fn confine_sqlite_source(
    state: &AppState,
    params: ConnectionParams,
) -> Result<ConnectionParams, ApiError> {
    let ConnectionParams::Sqlite { path } = params else {
        return Ok(params);
    };
    let Some(root) = state.sqlite_root.as_deref() else {
        return Err(ApiError::field(
            "sqlite_path",
            "SQLite sources are disabled on this server",
        ));
    };
    match resolve_within(root, &path) {
        Some(path) => Ok(ConnectionParams::Sqlite { path }),
        None => {
            log::warn!("Rejected SQLite source outside the allowed directory");
            Err(ApiError::field(
                "sqlite_path",
                "SQLite file not found in the allowed directory",
            ))
        }
    }
}

pub async fn submit(
    State(state): State<SharedState>,
    ClientContext(request): ClientContext,
    Json(form): Json<ConnectionForm>,
) -> Result<Json<Value>, ApiError> {
    let params = form
        .into_params()
        .map_err(|e| ApiError::field(e.field(), e.to_string()))?;
    let params = Arc::new(confine_sqlite_source(&state, params)?);
    let job_id = uuid::Uuid::new_v4().to_string();

    let tracker = state.tracker.clone();
    let (id, job_params) = (job_id.clone(), Arc::clone(&params));
    blocking(move || {
        tracker
            .create(&id, &request, &job_params)
            .map_err(tracker_failure)
    })
    .await?;
    state.remember(&job_id, params)?;

    Ok(Json(json!({
        "status": "success",
        "message": "Connection established",
        "job_id": job_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TablesRequest {
    #[serde(default)]
    pub job_id: Option<String>,
}

pub async fn tables(
    State(state): State<SharedState>,
    Json(body): Json<TablesRequest>,
) -> Result<Json<Value>, ApiError> {
    let job_id = require_job_id(body.job_id)?;
    let params = state.params_for(&job_id)?.ok_or_else(|| {
        ApiError::NotFound("Connection parameters expired, please resubmit the form".to_string())
    })?;

    let connector = Arc::clone(&state.connector);
    let tables = blocking(move || {
        connector
            .connect(&params)
            .and_then(|reader| reader.list_tables())
            .map_err(|e| ApiError::BadRequest(format!("Failed to get tables: {}", e)))
    })
    .await?;

    Ok(Json(json!({
        "status": "success",
        "tables": tables,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub selected_tables: Option<Vec<String>>,
}

pub async fn generate(
    State(state): State<SharedState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<Value>, ApiError> {
    let job_id = require_job_id(body.job_id)?;

    let tracker = state.tracker.clone();
    let id = job_id.clone();
    let job = blocking(move || tracker.get(&id).map_err(tracker_failure)).await?;
    if job.is_none() {
        return Err(ApiError::NotFound("Invalid job ID".to_string()));
    }
    let params = state.take(&job_id)?.ok_or_else(|| {
        ApiError::BadRequest("Connection parameters expired, please resubmit the form".to_string())
    })?;

    let tracker = state.tracker.clone();
    let id = job_id.clone();
    let started = blocking(move || {
        tracker
            .update(
                &id,
                JobUpdate::new()
                    .status(JobStatus::Starting)
                    .message(STARTING_MESSAGE)
                    .current(0),
            )
            .map_err(tracker_failure)
    })
    .await;
    if let Err(e) = started {
        state.remember(&job_id, params)?;
        return Err(e);
    }

    state
        .generator
        .spawn(job_id.clone(), params, body.selected_tables)
        .map_err(|e| ApiError::Internal(format!("Error: {}", e)))?;
    log::info!("Documentation generation started for job {}", job_id);

    Ok(Json(json!({
        "status": "success",
        "message": "Documentation generation started",
        "job_id": job_id,
    })))
}

#[derive(Debug, Serialize)]
pub struct ProgressBody {
    #[serde(flatten)]
    pub job: Job,
    pub percent: u8,
}

pub async fn progress(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Result<Json<ProgressBody>, ApiError> {
    let tracker = state.tracker.clone();
    let job = blocking(move || tracker.get(&job_id).map_err(tracker_failure))
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    Ok(Json(ProgressBody {
        percent: job.percent(),
        job,
    }))
}

pub async fn download(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if !is_safe_filename(&filename) {
        log::warn!("Rejected download of suspicious file name");
        return Err(ApiError::BadRequest("Invalid file name".to_string()));
    }

    let path = state.output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found".to_string()));
        }
        Err(e) => return Err(ApiError::Internal(format!("Failed to read file: {}", e))),
    };
    log::info!("Downloading file: {}", filename);

    Ok((
        [
            (CONTENT_TYPE, DOCX_MIME_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
