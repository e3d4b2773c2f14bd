//! Answer extraction and the sanitization boundary.
//!
//! - `extract_answers` builds the unified answer key from the generated
//!   question blocks, renumbering globally from 1.
//! - `strip_answers` produces the exam-taker view: no answer key, no
//!   per-question answer or explanation fields.

use serde_json::Value;
use tracing::debug;

use crate::domain::{AnswerEntry, AnswerKey, Exam, QuestionBlock, TaskAnswers};
use crate::question_types::type_info;

/// Per-question fields removed by `strip_answers`. Deliberately broader than
/// any single type's answer field so unexpected backend output still comes
/// out clean.
const STRIP_FIELDS: &[&str] = &[
  "correct_answer",
  "answer",
  "explanation",
  "correct_heading_id",
  "correct_paragraph",
  "correct_feature_id",
];

/// Collect answers from every block, in block order, assigning fresh global
/// question numbers from 1. The answer value is read from the single field
/// the block's type declares; a missing field records `null` rather than
/// skipping the slot, so numbering never drifts.
pub fn extract_answers(blocks: &[QuestionBlock]) -> AnswerKey {
  let mut counter = 0usize;
  let mut tasks = Vec::with_capacity(blocks.len());

  for block in blocks {
    let field = type_info(block.task_key).answer_field;
    let mut answers = Vec::with_capacity(block.questions.len());

    for q in &block.questions {
      counter += 1;
      let answer = q.get(field).cloned().unwrap_or(Value::Null);
      if answer.is_null() {
        debug!(target: "exam", task = %block.task_type, question = counter, %field, "Question has no answer value");
      }
      let explanation = q
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string);
      answers.push(AnswerEntry { question: counter, answer, explanation });
    }

    tasks.push(TaskAnswers { task_type: block.task_type.clone(), answers });
  }

  AnswerKey { total_questions: counter, tasks }
}

/// Return a copy of the exam safe to hand to an exam-taker: the top-level
/// answer key is dropped and every question object loses all answer-bearing
/// fields plus its explanation. The passage is untouched.
pub fn strip_answers(exam: &Exam) -> Exam {
  let mut sanitized = exam.clone();
  sanitized.answers = None;
  for task in &mut sanitized.tasks {
    for q in &mut task.questions {
      if let Value::Object(map) = q {
        for field in STRIP_FIELDS {
          map.remove(*field);
        }
      }
    }
  }
  sanitized
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Passage, PassageType};
  use crate::question_types::{QuestionTypeKey, ANSWER_FIELDS};
  use serde_json::json;

  fn block(key: QuestionTypeKey, name: &str, questions: Vec<Value>) -> QuestionBlock {
    QuestionBlock {
      task_type: name.to_string(),
      task_key: key,
      questions,
      extra: serde_json::Map::new(),
    }
  }

  #[test]
  fn extraction_renumbers_globally_from_one() {
    let blocks = vec![
      block(
        QuestionTypeKey::MultipleChoice,
        "Multiple Choice",
        vec![
          json!({"question_number": 41, "correct_answer": "B", "explanation": "See paragraph A."}),
          json!({"question_number": 42, "correct_answer": "D"}),
        ],
      ),
      block(
        QuestionTypeKey::TrueFalseNotGiven,
        "True/False/Not Given",
        vec![json!({"question_number": 1, "answer": "TRUE"})],
      ),
    ];
    let key = extract_answers(&blocks);
    assert_eq!(key.total_questions, 3);
    assert_eq!(key.tasks.len(), 2);
    let flat: Vec<usize> = key
      .tasks
      .iter()
      .flat_map(|t| t.answers.iter().map(|a| a.question))
      .collect();
    assert_eq!(flat, vec![1, 2, 3]);
    assert_eq!(key.tasks[0].answers[0].answer, json!("B"));
    assert_eq!(key.tasks[0].answers[0].explanation.as_deref(), Some("See paragraph A."));
    assert!(key.tasks[0].answers[1].explanation.is_none());
    assert_eq!(key.tasks[1].answers[0].answer, json!("TRUE"));
  }

  #[test]
  fn missing_answer_field_records_null_without_skipping() {
    let blocks = vec![block(
      QuestionTypeKey::MatchingHeadings,
      "Matching Headings",
      vec![
        json!({"paragraph": "A", "correct_heading_id": "ii"}),
        json!({"paragraph": "B"}),
        json!({"paragraph": "C", "correct_heading_id": "iv"}),
      ],
    )];
    let key = extract_answers(&blocks);
    assert_eq!(key.total_questions, 3);
    let answers = &key.tasks[0].answers;
    assert_eq!(answers[1].question, 2);
    assert!(answers[1].answer.is_null());
    assert_eq!(answers[2].answer, json!("iv"));
  }

  #[test]
  fn reads_the_declared_field_not_a_priority_probe() {
    // A stray "answer" next to the declared "correct_paragraph" must lose.
    let blocks = vec![block(
      QuestionTypeKey::MatchingInformation,
      "Matching Information",
      vec![json!({"statement": "s", "answer": "WRONG", "correct_paragraph": "D"})],
    )];
    let key = extract_answers(&blocks);
    assert_eq!(key.tasks[0].answers[0].answer, json!("D"));
  }

  fn sample_exam() -> Exam {
    let blocks = vec![block(
      QuestionTypeKey::ShortAnswer,
      "Short Answer Questions",
      vec![json!({
        "question_number": 1,
        "question_text": "What year?",
        "answer": "1987",
        "explanation": "Stated in paragraph B."
      })],
    )];
    let answers = extract_answers(&blocks);
    Exam {
      exam_type: "reading".into(),
      passage_type: PassageType::One,
      reading_passage: Passage {
        title: "T".into(),
        content: "A body paragraph.".into(),
        topic: "t".into(),
        word_count: 3,
      },
      total_questions: answers.total_questions,
      tasks: blocks,
      answers: Some(answers),
    }
  }

  #[test]
  fn strip_removes_key_and_all_answer_fields() {
    let exam = sample_exam();
    let clean = strip_answers(&exam);
    assert!(clean.answers.is_none());
    let q = clean.tasks[0].questions[0].as_object().unwrap();
    for field in STRIP_FIELDS {
      assert!(!q.contains_key(*field), "field '{}' must be stripped", field);
    }
    assert_eq!(q.get("question_text"), Some(&serde_json::json!("What year?")));
    // Source exam untouched.
    assert!(exam.answers.is_some());
    assert_eq!(clean.reading_passage.content, exam.reading_passage.content);
  }

  #[test]
  fn strip_list_covers_every_registry_answer_field() {
    for field in ANSWER_FIELDS {
      if *field == "correct_ending_id" {
        continue; // legacy tag, no registry type emits it
      }
      assert!(STRIP_FIELDS.contains(field), "'{}' missing from strip list", field);
    }
  }
}
