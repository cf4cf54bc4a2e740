//! Web front end for schemadoc.

pub mod api;
pub mod client;
pub mod error;
pub mod page;
pub mod state;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, SharedState};

/// Builds the axum router with all routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if state.cors_allow_any_origin {
        cors.allow_origin(Any)
    } else {
        cors
    };

    Router::new()
        .route("/", get(api::index).post(api::submit))
        .route("/tables", post(api::tables))
        .route("/generate", post(api::generate))
        .route("/progress/{job_id}", get(api::progress))
        .route("/download/{filename}", get(api::download))
        .route("/health", get(api::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
