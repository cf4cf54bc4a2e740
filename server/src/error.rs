use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Handler failures, rendered as `{"status":"error","message":...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Form validation failed")]
    Validation {
        errors: BTreeMap<&'static str, Vec<String>>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field, vec![message.into()]);
        ApiError::Validation { errors }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        let body = match &self {
            ApiError::Validation { errors } => json!({
                "status": "error",
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => json!({
                "status": "error",
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
