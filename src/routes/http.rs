//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; logs include parameters and basic result info.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use tracing::{error, info, instrument};

use crate::answers::strip_answers;
use crate::domain::{Session, SessionStatus, StageKind};
use crate::error::{AppError, AppResult};
use crate::extract::{extract, DocumentSource};
use crate::pipeline::RegenerateMode;
use crate::protocol::*;
use crate::state::AppState;
use crate::store::{new_session_id, SessionStore, TextArtifact};
use crate::util::count_words;
use crate::validate::validate_exam;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

/// Ingest a document: create the session, extract the source to text, and
/// store it. Extraction runs inline; sessions are small and sources are
/// bounded, so there is no reason to defer it.
#[instrument(level = "info", skip(state, body))]
pub async fn http_create_document(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateDocumentIn>,
) -> AppResult<impl IntoResponse> {
  let source = match (body.text, body.url, body.file_path) {
    (Some(content), None, None) => DocumentSource::Text { content },
    (None, Some(url), None) => DocumentSource::Url { url },
    (None, None, Some(path)) => DocumentSource::File { path: path.into() },
    _ => {
      return Err(AppError::InvalidRequest(
        "provide exactly one of text, url, file_path".into(),
      ))
    }
  };

  let session_id = new_session_id();
  let filename = body.filename.unwrap_or_else(|| source.label());
  let mut session = Session::new(session_id.clone(), filename, source.kind().to_string());
  session.stages.mark(StageKind::Upload);
  session.status = SessionStatus::Extracting;
  state.store().create(session).await?;

  let text = match extract(&state.http_client, &source).await {
    Ok(text) => text,
    Err(e) => {
      // The session stays around with the failure recorded, so the client
      // can inspect what went wrong.
      state.store().mark_failed(&session_id, &e.to_string()).await?;
      return Err(e);
    }
  };

  state.store().save_text(&session_id, TextArtifact::Source, &text).await?;
  let mut session = state.store().get(&session_id).await?;
  session.status = SessionStatus::Extracted;
  session.word_count = count_words(&text);
  session.stages.mark(StageKind::Extract);
  session.updated_at = chrono::Utc::now();
  state.store().update(&session).await?;

  info!(target: "exam", %session_id, words = session.word_count, "Document ingested");
  Ok((StatusCode::CREATED, Json(to_out(&session))))
}

/// Kick off background generation for an extracted session.
#[instrument(level = "info", skip(state, body), fields(%session_id))]
pub async fn http_start_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Json(body): Json<StartExamIn>,
) -> AppResult<impl IntoResponse> {
  let config = body.into_config()?;
  let session = state.store().get(&session_id).await?;

  match session.status {
    SessionStatus::Created | SessionStatus::Extracting => {
      return Err(AppError::InvalidRequest("session has no extracted source yet".into()));
    }
    SessionStatus::Queued
    | SessionStatus::Preprocessing
    | SessionStatus::GeneratingPassage
    | SessionStatus::PlanningStrategy
    | SessionStatus::GeneratingQuestions
    | SessionStatus::Finalizing => {
      return Err(AppError::Conflict("generation already in progress".into()));
    }
    SessionStatus::Extracted | SessionStatus::Completed | SessionStatus::Failed => {}
  }

  // Set progress directly: `update_status` keeps the high-water mark, and a
  // restarted run must report 0, not the previous run's 100.
  let mut queued = state.store().get(&session_id).await?;
  queued.status = SessionStatus::Queued;
  queued.progress = 0;
  queued.error = None;
  queued.exam_config = Some(config);
  queued.updated_at = chrono::Utc::now();
  state.store().update(&queued).await?;

  let pipeline = state.pipeline.clone();
  let id = session_id.clone();
  tokio::spawn(async move {
    if let Err(e) = pipeline.run(&id, config).await {
      error!(target: "exam", session_id = %id, error = %e, "Background generation failed");
      if let Err(e2) = pipeline.store.mark_failed(&id, &e.to_string()).await {
        error!(target: "exam", session_id = %id, error = %e2, "Could not record failure");
      }
    }
  });

  Ok((StatusCode::ACCEPTED, Json(to_out(&queued))))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_exam_status(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  let session = state.store().get(&session_id).await?;
  Ok(Json(to_out(&session)))
}

/// The sanitized exam: no answer key, no per-question answer fields.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_get_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  let exam = state.store().load_exam(&session_id).await?;
  Ok(Json(strip_answers(&exam)))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_download_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  let exam = state.store().load_exam(&session_id).await?;
  let body = serde_json::to_string_pretty(&strip_answers(&exam))?;
  let disposition = format!("attachment; filename=\"exam_{}.json\"", session_id);
  Ok((
    [
      (header::CONTENT_TYPE, "application/json".to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  ))
}

/// Hand out the answer key once the exam-taker submits.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_submit_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  let answer_key = state.store().load_answer_key(&session_id).await?;
  info!(target: "exam", %session_id, total = answer_key.total_questions, "Answer key served");
  Ok(Json(SubmitOut { answer_key }))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_validate_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  let exam = state.store().load_exam(&session_id).await?;
  let (valid, report) = validate_exam(&exam);
  Ok(Json(ValidateOut { valid, report }))
}

/// Foreground regeneration: the caller waits for the new exam and gets the
/// error directly if a stage fails.
#[instrument(level = "info", skip(state, body), fields(%session_id, mode = ?body.mode))]
pub async fn http_regenerate_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Json(body): Json<RegenerateIn>,
) -> AppResult<impl IntoResponse> {
  let session = state.store().get(&session_id).await?;
  if matches!(
    session.status,
    SessionStatus::Queued
      | SessionStatus::Preprocessing
      | SessionStatus::GeneratingPassage
      | SessionStatus::PlanningStrategy
      | SessionStatus::GeneratingQuestions
      | SessionStatus::Finalizing
  ) {
    return Err(AppError::Conflict("generation already in progress".into()));
  }

  let mode: RegenerateMode = body.mode;
  let exam = state.pipeline.regenerate(&session_id, mode).await?;
  Ok(Json(strip_answers(&exam)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_sessions(
  State(state): State<Arc<AppState>>,
) -> AppResult<impl IntoResponse> {
  let sessions = state.store().list().await?;
  Ok(Json(SessionListOut { sessions: sessions.iter().map(to_out).collect() }))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  let session = state.store().get(&session_id).await?;
  Ok(Json(to_out(&session)))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
  state.store().delete(&session_id).await?;
  info!(target: "exam", %session_id, "Session deleted");
  Ok(Json(DeletedOut { deleted: session_id }))
}
