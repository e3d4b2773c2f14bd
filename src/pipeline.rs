//! Exam generation pipeline: preprocess, passage, plan, questions, finalize.
//!
//! Each stage persists its artifact through the session store BEFORE the
//! session advances, so a crash mid-run leaves the last completed stage on
//! disk and the status pointing at the stage that was running. Stage
//! progress: 10 (preprocess), 30 (passage), 50 (plan), 60..90 (questions,
//! linear across tasks), 95 (finalize), 100 (done).
//!
//! A background run records failures into the session; a foreground call
//! (regeneration) propagates them to the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::answers::extract_answers;
use crate::config::{PipelineSettings, Prompts};
use crate::domain::{
  AnswerKey, Exam, ExamConfig, Passage, QuestionBlock, SessionStatus, StageKind, TaskPlan,
};
use crate::error::{AppError, AppResult};
use crate::llm::LlmClient;
use crate::preprocess::clean_references;
use crate::store::{SessionStore, TextArtifact};
use crate::strategy::plan_question_strategy;
use crate::util::count_words;
use crate::validate::validate_exam;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerateMode {
  Passage,
  Questions,
  All,
}

pub struct ExamPipeline<S> {
  pub store: Arc<S>,
  pub llm: Option<LlmClient>,
  pub prompts: Prompts,
  pub settings: PipelineSettings,
}

impl<S> Clone for ExamPipeline<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      llm: self.llm.clone(),
      prompts: self.prompts.clone(),
      settings: self.settings.clone(),
    }
  }
}

impl<S: SessionStore> ExamPipeline<S> {
  fn llm(&self) -> AppResult<&LlmClient> {
    self
      .llm
      .as_ref()
      .ok_or_else(|| AppError::generation("backend", "completion backend not configured (no OPENAI_API_KEY)"))
  }

  /// Full generation run against an extracted session.
  #[instrument(level = "info", skip(self, config), fields(%session_id))]
  pub async fn run(&self, session_id: &str, config: ExamConfig) -> AppResult<Exam> {
    let mut session = self.store.get(session_id).await?;
    session.exam_config = Some(config);
    session.status = SessionStatus::Queued;
    session.progress = 0;
    session.error = None;
    session.updated_at = chrono::Utc::now();
    self.store.update(&session).await?;

    self.preprocess_stage(session_id).await?;
    let passage = self.passage_stage(session_id, config).await?;
    let plans = self.plan_stage(session_id, config).await?;
    let blocks = self.questions_stage(session_id, &passage, &plans).await?;
    self.finalize_stage(session_id, config, passage, blocks).await
  }

  /// Re-run part of a completed (or failed) generation.
  #[instrument(level = "info", skip(self), fields(%session_id, ?mode))]
  pub async fn regenerate(&self, session_id: &str, mode: RegenerateMode) -> AppResult<Exam> {
    let mut session = self.store.get(session_id).await?;
    let config = session
      .exam_config
      .ok_or_else(|| AppError::InvalidRequest("session has no exam configuration to regenerate from".into()))?;

    // A regeneration is a fresh run: progress restarts from zero rather
    // than sticking at the previous run's high-water mark.
    session.progress = 0;
    session.error = None;
    session.updated_at = chrono::Utc::now();
    self.store.update(&session).await?;

    match mode {
      RegenerateMode::All => self.run(session_id, config).await,
      RegenerateMode::Passage => {
        // Fresh passage from the stored extracted text. Stored question
        // blocks stay as they are and the exam is reassembled around them;
        // only when none survive (an earlier run died before questions) do
        // we generate them.
        let passage = self.passage_stage(session_id, config).await?;
        let blocks = match self.store.load_question_blocks(session_id).await {
          Ok(blocks) => blocks,
          Err(AppError::MissingArtifact { .. }) => {
            let plans = self.plan_stage(session_id, config).await?;
            self.questions_stage(session_id, &passage, &plans).await?
          }
          Err(e) => return Err(e),
        };
        self.finalize_stage(session_id, config, passage, blocks).await
      }
      RegenerateMode::Questions => {
        let passage = self.store.load_passage(session_id).await?;
        let plans = self.plan_stage(session_id, config).await?;
        let blocks = self.questions_stage(session_id, &passage, &plans).await?;
        self.finalize_stage(session_id, config, passage, blocks).await
      }
    }
  }

  /// Clean the raw source and persist the extracted text.
  async fn preprocess_stage(&self, session_id: &str) -> AppResult<()> {
    self.store.update_status(session_id, SessionStatus::Preprocessing, 10).await?;
    let source = self.store.load_text(session_id, TextArtifact::Source).await?;
    let cleaned = clean_references(&source);
    self.store.save_text(session_id, TextArtifact::Extracted, &cleaned).await?;

    let mut session = self.store.get(session_id).await?;
    session.word_count = count_words(&cleaned);
    session.updated_at = chrono::Utc::now();
    self.store.update(&session).await?;
    info!(target: "exam", %session_id, words = session.word_count, "Source preprocessed");
    Ok(())
  }

  async fn passage_stage(&self, session_id: &str, config: ExamConfig) -> AppResult<Passage> {
    self.store.update_status(session_id, SessionStatus::GeneratingPassage, 30).await?;
    let text = self.store.load_text(session_id, TextArtifact::Extracted).await?;
    let budget = self.settings.source_char_budget;
    let prefix: String = text.chars().take(budget).collect();

    let passage = self
      .llm()?
      .generate_passage(&self.prompts, config.passage_type, &prefix)
      .await
      .map_err(|e| AppError::generation("passage", e))?;

    self.store.save_passage(session_id, &passage).await?;
    self.store.mark_stage(session_id, StageKind::Passage).await?;
    Ok(passage)
  }

  async fn plan_stage(&self, session_id: &str, config: ExamConfig) -> AppResult<Vec<TaskPlan>> {
    self.store.update_status(session_id, SessionStatus::PlanningStrategy, 50).await?;
    let plans = plan_question_strategy(
      config.total_questions,
      config.num_question_types,
      &mut rand::thread_rng(),
    );
    info!(target: "exam", %session_id, tasks = plans.len(), "Question strategy planned");
    Ok(plans)
  }

  async fn questions_stage(
    &self,
    session_id: &str,
    passage: &Passage,
    plans: &[TaskPlan],
  ) -> AppResult<Vec<QuestionBlock>> {
    self.store.update_status(session_id, SessionStatus::GeneratingQuestions, 60).await?;
    self.store.clear_question_blocks(session_id).await?;

    let mut blocks = Vec::with_capacity(plans.len());
    for (i, plan) in plans.iter().enumerate() {
      let mut block = self
        .llm()?
        .generate_question_block(&self.prompts, passage, plan)
        .await
        .map_err(|e| AppError::generation("questions", e))?;
      reconcile_numbering(&mut block, plan);

      self.store.save_question_block(session_id, i, &block).await?;
      let progress = 60 + (30 * (i + 1) / plans.len()) as u8;
      self.store.update_status(session_id, SessionStatus::GeneratingQuestions, progress).await?;
      blocks.push(block);
    }
    Ok(blocks)
  }

  async fn finalize_stage(
    &self,
    session_id: &str,
    config: ExamConfig,
    passage: Passage,
    blocks: Vec<QuestionBlock>,
  ) -> AppResult<Exam> {
    self.store.update_status(session_id, SessionStatus::Finalizing, 95).await?;

    let answers = extract_answers(&blocks);
    self.store.save_answer_key(session_id, &answers).await?;

    let exam = assemble_exam(config, passage, blocks, answers);
    let (valid, report) = validate_exam(&exam);
    if !valid {
      warn!(target: "exam", %session_id, report = %serde_json::to_string(&report).unwrap_or_default(), "Assembled exam failed validation");
    }

    self.store.save_exam(session_id, &exam).await?;
    self.store.mark_stage(session_id, StageKind::Questions).await?;
    self.store.mark_stage(session_id, StageKind::Exam).await?;
    self.store.update_status(session_id, SessionStatus::Completed, 100).await?;
    info!(target: "exam", %session_id, total_questions = exam.total_questions, "Exam completed");
    Ok(exam)
  }
}

/// The planner's range is authoritative: rewrite each question's number to
/// `start_number + i`, logging when the generated numbering disagreed.
fn reconcile_numbering(block: &mut QuestionBlock, plan: &TaskPlan) {
  for (i, q) in block.questions.iter_mut().enumerate() {
    let expected = (plan.start_number + i) as u64;
    if let Some(obj) = q.as_object_mut() {
      let embedded = obj.get("question_number").and_then(Value::as_u64);
      if embedded != Some(expected) {
        warn!(
          target: "exam",
          task = %plan.type_name,
          ?embedded,
          expected,
          "Renumbering question to the planned range"
        );
      }
      obj.insert("question_number".into(), json!(expected));
    }
  }
}

fn assemble_exam(
  config: ExamConfig,
  passage: Passage,
  blocks: Vec<QuestionBlock>,
  answers: AnswerKey,
) -> Exam {
  Exam {
    exam_type: "reading".into(),
    passage_type: config.passage_type,
    reading_passage: passage,
    total_questions: answers.total_questions,
    tasks: blocks,
    answers: Some(answers),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{PassageType, Session};
  use crate::question_types::QuestionTypeKey;
  use crate::store::memory::MemorySessionStore;
  use serde_json::json;

  fn pipeline() -> ExamPipeline<MemorySessionStore> {
    ExamPipeline {
      store: Arc::new(MemorySessionStore::new()),
      llm: None,
      prompts: Prompts::default(),
      settings: PipelineSettings::default(),
    }
  }

  fn config() -> ExamConfig {
    ExamConfig {
      passage_type: PassageType::One,
      total_questions: 13,
      num_question_types: Some(3),
    }
  }

  #[test]
  fn reconciliation_rewrites_to_planned_range() {
    let mut block = QuestionBlock {
      task_type: "Short Answer Questions".into(),
      task_key: QuestionTypeKey::ShortAnswer,
      questions: vec![
        json!({"question_number": 1, "answer": "a"}),
        json!({"question_number": 2, "answer": "b"}),
        json!({"answer": "c"}),
      ],
      extra: serde_json::Map::new(),
    };
    let plan = TaskPlan {
      type_key: QuestionTypeKey::ShortAnswer,
      type_name: "Short Answer Questions".into(),
      question_count: 3,
      start_number: 6,
      out_of_bounds: false,
    };
    reconcile_numbering(&mut block, &plan);
    let numbers: Vec<u64> = block
      .questions
      .iter()
      .map(|q| q["question_number"].as_u64().unwrap())
      .collect();
    assert_eq!(numbers, vec![6, 7, 8]);
  }

  #[test]
  fn assembled_exam_totals_come_from_the_answer_key() {
    let blocks = vec![QuestionBlock {
      task_type: "Short Answer Questions".into(),
      task_key: QuestionTypeKey::ShortAnswer,
      questions: vec![json!({"question_number": 1, "answer": "x"})],
      extra: serde_json::Map::new(),
    }];
    let answers = extract_answers(&blocks);
    let passage = Passage {
      title: "T".into(),
      content: "Body.".into(),
      topic: "t".into(),
      word_count: 1,
    };
    let exam = assemble_exam(config(), passage, blocks, answers);
    assert_eq!(exam.total_questions, 1);
    assert_eq!(exam.exam_type, "reading");
    assert!(exam.answers.is_some());
  }

  #[tokio::test]
  async fn run_without_backend_fails_at_passage_but_keeps_preprocessing() {
    let p = pipeline();
    p.store
      .create(Session::new("s1".into(), "doc".into(), "text".into()))
      .await
      .unwrap();
    p.store
      .save_text("s1", TextArtifact::Source, "Body text here.\n\n## References\n[1] X.")
      .await
      .unwrap();

    let err = p.run("s1", config()).await.unwrap_err();
    assert!(matches!(err, AppError::Generation { stage: "backend", .. }));

    // Preprocessing still persisted its artifact and word count.
    let extracted = p.store.load_text("s1", TextArtifact::Extracted).await.unwrap();
    assert_eq!(extracted, "Body text here.");
    let session = p.store.get("s1").await.unwrap();
    assert_eq!(session.word_count, 3);
    assert_eq!(session.status, SessionStatus::GeneratingPassage);
    assert_eq!(session.progress, 30);
  }

  #[tokio::test]
  async fn regenerate_questions_requires_a_stored_passage() {
    let p = pipeline();
    let mut session = Session::new("s2".into(), "doc".into(), "text".into());
    session.exam_config = Some(config());
    p.store.create(session).await.unwrap();

    let err = p.regenerate("s2", RegenerateMode::Questions).await.unwrap_err();
    assert!(matches!(err, AppError::MissingArtifact { kind: "passage", .. }));
  }

  #[tokio::test]
  async fn regeneration_restarts_progress_from_zero() {
    let p = pipeline();
    let mut session = Session::new("s5".into(), "doc".into(), "text".into());
    session.exam_config = Some(config());
    session.status = SessionStatus::Completed;
    session.progress = 100;
    p.store.create(session).await.unwrap();
    let passage = Passage {
      title: "T".into(),
      content: "Body.".into(),
      topic: "t".into(),
      word_count: 1,
    };
    p.store.save_passage("s5", &passage).await.unwrap();

    // No backend configured: the run dies in the questions stage, but by
    // then progress must reflect the NEW run, not the finished one.
    let err = p.regenerate("s5", RegenerateMode::Questions).await.unwrap_err();
    assert!(matches!(err, AppError::Generation { .. }));

    let session = p.store.get("s5").await.unwrap();
    assert_eq!(session.progress, 60);
  }

  #[tokio::test]
  async fn regenerate_without_config_is_an_invalid_request() {
    let p = pipeline();
    p.store
      .create(Session::new("s3".into(), "doc".into(), "text".into()))
      .await
      .unwrap();
    let err = p.regenerate("s3", RegenerateMode::All).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
  }

  #[test]
  fn regenerate_mode_parses_from_snake_case() {
    let m: RegenerateMode = serde_json::from_str("\"passage\"").unwrap();
    assert_eq!(m, RegenerateMode::Passage);
    let m: RegenerateMode = serde_json::from_str("\"all\"").unwrap();
    assert_eq!(m, RegenerateMode::All);
  }
}
