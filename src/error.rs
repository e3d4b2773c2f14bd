//! Error taxonomy for the generation pipeline and its HTTP boundary.
//!
//! Stage failures inside a background run are recorded into the session
//! (`status=failed`, `error=<message>`) rather than propagated; foreground
//! calls (single-stage regeneration) surface these directly to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  /// Source could not be converted to text; fatal to the run.
  #[error("extraction failed: {0}")]
  Extraction(String),

  /// The completion backend exhausted its retries for one request.
  #[error("generation failed at stage '{stage}': {message}")]
  Generation { stage: &'static str, message: String },

  #[error("session not found: {0}")]
  SessionNotFound(String),

  /// A stage was asked to run against an artifact that was never stored,
  /// e.g. regenerating questions before a passage exists.
  #[error("session {session_id} has no stored '{kind}' artifact")]
  MissingArtifact { session_id: String, kind: &'static str },

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// The session is in a state that forbids the operation, e.g. starting a
  /// second generation while one is in flight.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("storage error: {0}")]
  Storage(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
  pub fn generation(stage: &'static str, message: impl Into<String>) -> Self {
    AppError::Generation { stage, message: message.into() }
  }

  pub fn status_code(&self) -> axum::http::StatusCode {
    use axum::http::StatusCode;
    match self {
      AppError::SessionNotFound(_) | AppError::MissingArtifact { .. } => StatusCode::NOT_FOUND,
      AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::Generation { .. } => StatusCode::BAD_GATEWAY,
      AppError::Storage(_) | AppError::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl axum::response::IntoResponse for AppError {
  fn into_response(self) -> axum::response::Response {
    let status = self.status_code();
    let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
    (status, body).into_response()
  }
}
