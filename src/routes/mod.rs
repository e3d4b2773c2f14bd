//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/documents", post(http::http_create_document))
        .route("/api/v1/sessions", get(http::http_list_sessions))
        .route(
            "/api/v1/sessions/:session_id",
            get(http::http_get_session).delete(http::http_delete_session),
        )
        .route("/api/v1/exams/:session_id", post(http::http_start_exam).get(http::http_get_exam))
        .route("/api/v1/exams/:session_id/status", get(http::http_exam_status))
        .route("/api/v1/exams/:session_id/download", get(http::http_download_exam))
        .route("/api/v1/exams/:session_id/submit", post(http::http_submit_exam))
        .route("/api/v1/exams/:session_id/validate", get(http::http_validate_exam))
        .route("/api/v1/exams/:session_id/regenerate", post(http::http_regenerate_exam))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
