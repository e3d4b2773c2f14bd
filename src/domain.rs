//! Domain models for the exam pipeline: passages, task plans, question
//! blocks, answer keys, the assembled exam, and the session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::question_types::QuestionTypeKey;

/// One of three stylistic/difficulty registers for the reading passage.
/// Serialized as its numeric form (1, 2, or 3) in artifacts and requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PassageType {
  One,
  Two,
  Three,
}

impl TryFrom<u8> for PassageType {
  type Error = String;

  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      1 => Ok(PassageType::One),
      2 => Ok(PassageType::Two),
      3 => Ok(PassageType::Three),
      other => Err(format!("passage_type must be 1, 2, or 3 (got {})", other)),
    }
  }
}

impl From<PassageType> for u8 {
  fn from(p: PassageType) -> u8 {
    match p {
      PassageType::One => 1,
      PassageType::Two => 2,
      PassageType::Three => 3,
    }
  }
}

impl PassageType {
  /// Target word band (min, max) for this register.
  pub fn word_band(self) -> (usize, usize) {
    match self {
      PassageType::One => (700, 900),
      PassageType::Two => (700, 1000),
      PassageType::Three => (750, 1200),
    }
  }

  pub fn style(self) -> &'static str {
    match self {
      PassageType::One => "General interest, factual",
      PassageType::Two => "Problem/solution focus",
      PassageType::Three => "Abstract, argumentative, research-based",
    }
  }
}

/// Generated reading passage. `word_count` is recomputed server-side from
/// `content`, never trusted from the backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Passage {
  pub title: String,
  pub content: String,
  pub topic: String,
  #[serde(default)]
  pub word_count: usize,
}

/// One planned generation unit: a count of questions of one type, covering
/// a contiguous global number range starting at `start_number`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskPlan {
  pub type_key: QuestionTypeKey,
  pub type_name: String,
  pub question_count: usize,
  pub start_number: usize,
  /// True when the final rebalance pushed this task's count outside its
  /// type's [min, max] bounds. The total still sums exactly.
  #[serde(default)]
  pub out_of_bounds: bool,
}

impl TaskPlan {
  pub fn end_number(&self) -> usize {
    self.start_number + self.question_count - 1
  }
}

/// Raw generated output for one task. Per-question objects are kept as
/// loose JSON because each type follows its own schema; `extra` captures
/// schema-level siblings (instructions, headings/features lists, summary).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionBlock {
  pub task_type: String,
  pub task_key: QuestionTypeKey,
  #[serde(default)]
  pub questions: Vec<Value>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerEntry {
  /// Global, 1-based, contiguous across all tasks.
  pub question: usize,
  pub answer: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskAnswers {
  pub task_type: String,
  pub answers: Vec<AnswerEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerKey {
  pub total_questions: usize,
  pub tasks: Vec<TaskAnswers>,
}

/// The assembled exam. The internal form carries `answers`; the sanitized
/// form handed to exam-takers has it stripped (see `answers::strip_answers`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exam {
  pub exam_type: String,
  pub passage_type: PassageType,
  pub reading_passage: Passage,
  pub total_questions: usize,
  pub tasks: Vec<QuestionBlock>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answers: Option<AnswerKey>,
}

/// Active exam configuration for one generation run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExamConfig {
  pub passage_type: PassageType,
  pub total_questions: usize,
  pub num_question_types: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  Created,
  Extracting,
  Extracted,
  Queued,
  Preprocessing,
  GeneratingPassage,
  PlanningStrategy,
  GeneratingQuestions,
  Finalizing,
  Completed,
  Failed,
}

/// Completion marker for one coarse stage of a session's journey.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageMarker {
  pub status: String,
  pub completed_at: DateTime<Utc>,
}

impl StageMarker {
  pub fn completed() -> Self {
    Self { status: "completed".into(), completed_at: Utc::now() }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
  Upload,
  Extract,
  Passage,
  Questions,
  Exam,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stages {
  pub upload: Option<StageMarker>,
  pub extract: Option<StageMarker>,
  pub passage: Option<StageMarker>,
  pub questions: Option<StageMarker>,
  pub exam: Option<StageMarker>,
}

impl Stages {
  pub fn mark(&mut self, kind: StageKind) {
    let slot = match kind {
      StageKind::Upload => &mut self.upload,
      StageKind::Extract => &mut self.extract,
      StageKind::Passage => &mut self.passage,
      StageKind::Questions => &mut self.questions,
      StageKind::Exam => &mut self.exam,
    };
    *slot = Some(StageMarker::completed());
  }
}

/// Durable record tracking one document's journey through the pipeline.
/// Single-writer: only the orchestrator (or its caller during a foreground
/// regeneration) mutates it; writes are last-write-wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
  pub session_id: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub filename: String,
  pub source_type: String,
  pub status: SessionStatus,
  pub stages: Stages,
  /// 0-100, monotonic non-decreasing within one run.
  pub progress: u8,
  pub word_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exam_config: Option<ExamConfig>,
}

impl Session {
  pub fn new(session_id: String, filename: String, source_type: String) -> Self {
    let now = Utc::now();
    Self {
      session_id,
      created_at: now,
      updated_at: now,
      filename,
      source_type,
      status: SessionStatus::Created,
      stages: Stages::default(),
      progress: 0,
      word_count: 0,
      error: None,
      exam_config: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn passage_type_roundtrips_through_numbers() {
    for n in 1u8..=3 {
      let p = PassageType::try_from(n).unwrap();
      assert_eq!(u8::from(p), n);
      let json = serde_json::to_string(&p).unwrap();
      assert_eq!(json, n.to_string());
    }
    assert!(PassageType::try_from(4).is_err());
  }

  #[test]
  fn word_bands_match_register() {
    assert_eq!(PassageType::One.word_band(), (700, 900));
    assert_eq!(PassageType::Two.word_band(), (700, 1000));
    assert_eq!(PassageType::Three.word_band(), (750, 1200));
  }

  #[test]
  fn task_plan_end_number_is_inclusive() {
    let plan = TaskPlan {
      type_key: crate::question_types::QuestionTypeKey::ShortAnswer,
      type_name: "Short Answer Questions".into(),
      question_count: 5,
      start_number: 8,
      out_of_bounds: false,
    };
    assert_eq!(plan.end_number(), 12);
  }

  #[test]
  fn question_block_flatten_keeps_schema_siblings() {
    let json = serde_json::json!({
      "task_type": "Matching Headings",
      "task_key": "matching_headings",
      "headings": [{"id": "i", "text": "Intro"}],
      "questions": [{"question_number": 1, "paragraph": "A", "correct_heading_id": "i"}]
    });
    let block: QuestionBlock = serde_json::from_value(json).unwrap();
    assert_eq!(block.questions.len(), 1);
    assert!(block.extra.contains_key("headings"));
  }
}
