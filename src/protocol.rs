//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ExamConfig, PassageType, Session, SessionStatus, Stages};
use crate::error::{AppError, AppResult};
use crate::pipeline::RegenerateMode;
use crate::validate::ValidationReport;

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

/// Document ingestion request. Exactly one of `text`, `url`, `file_path`
/// must be present.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentIn {
  pub text: Option<String>,
  pub url: Option<String>,
  pub file_path: Option<String>,
  /// Display name; defaults to something derived from the source.
  pub filename: Option<String>,
}

/// Generation request for an extracted session.
#[derive(Debug, Deserialize)]
pub struct StartExamIn {
  pub passage_type: u8,
  pub total_questions: usize,
  #[serde(default)]
  pub num_question_types: Option<usize>,
}

impl StartExamIn {
  /// Boundary validation: passage_type in {1,2,3}, total in [12,15],
  /// num_question_types in {2,3} when present.
  pub fn into_config(self) -> AppResult<ExamConfig> {
    let passage_type = PassageType::try_from(self.passage_type).map_err(AppError::InvalidRequest)?;
    if !(12..=15).contains(&self.total_questions) {
      return Err(AppError::InvalidRequest(format!(
        "total_questions must be between 12 and 15 (got {})",
        self.total_questions
      )));
    }
    if let Some(n) = self.num_question_types {
      if !(2..=3).contains(&n) {
        return Err(AppError::InvalidRequest(format!(
          "num_question_types must be 2 or 3 (got {})",
          n
        )));
      }
    }
    Ok(ExamConfig {
      passage_type,
      total_questions: self.total_questions,
      num_question_types: self.num_question_types,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct RegenerateIn {
  pub mode: RegenerateMode,
}

/// Public session view.
#[derive(Debug, Serialize)]
pub struct SessionOut {
  pub session_id: String,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub updated_at: chrono::DateTime<chrono::Utc>,
  pub filename: String,
  pub source_type: String,
  pub status: SessionStatus,
  pub stages: Stages,
  pub progress: u8,
  pub word_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exam_config: Option<ExamConfig>,
}

/// Convert the internal `Session` to the public DTO.
pub fn to_out(s: &Session) -> SessionOut {
  SessionOut {
    session_id: s.session_id.clone(),
    created_at: s.created_at,
    updated_at: s.updated_at,
    filename: s.filename.clone(),
    source_type: s.source_type.clone(),
    status: s.status,
    stages: s.stages.clone(),
    progress: s.progress,
    word_count: s.word_count,
    error: s.error.clone(),
    exam_config: s.exam_config,
  }
}

#[derive(Debug, Serialize)]
pub struct SessionListOut {
  pub sessions: Vec<SessionOut>,
}

#[derive(Debug, Serialize)]
pub struct ValidateOut {
  pub valid: bool,
  pub report: ValidationReport,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
  pub answer_key: crate::domain::AnswerKey,
}

#[derive(Debug, Serialize)]
pub struct DeletedOut {
  pub deleted: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn start_exam_validation_accepts_the_documented_ranges() {
    let cfg = StartExamIn { passage_type: 2, total_questions: 13, num_question_types: Some(3) }
      .into_config()
      .unwrap();
    assert_eq!(cfg.passage_type, PassageType::Two);
    assert_eq!(cfg.total_questions, 13);
  }

  #[test]
  fn start_exam_validation_rejects_out_of_range_values() {
    assert!(StartExamIn { passage_type: 4, total_questions: 13, num_question_types: None }
      .into_config()
      .is_err());
    assert!(StartExamIn { passage_type: 1, total_questions: 11, num_question_types: None }
      .into_config()
      .is_err());
    assert!(StartExamIn { passage_type: 1, total_questions: 16, num_question_types: None }
      .into_config()
      .is_err());
    assert!(StartExamIn { passage_type: 1, total_questions: 13, num_question_types: Some(4) }
      .into_config()
      .is_err());
  }
}
