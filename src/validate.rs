//! Read-only structural validation of an assembled exam.
//!
//! Three independent sections (passage, questions, answers) each collect
//! their own issue list; the exam is valid only when all three are clean.
//! Validation never mutates the exam and never talks to the backend.

use std::collections::BTreeSet;

use serde_json::Value;
use serde::Serialize;

use crate::domain::Exam;
use crate::question_types::ANSWER_FIELDS;
use crate::util::count_words;

#[derive(Clone, Debug, Default, Serialize)]
pub struct SectionReport {
  pub valid: bool,
  pub issues: Vec<String>,
}

impl SectionReport {
  fn from_issues(issues: Vec<String>) -> Self {
    Self { valid: issues.is_empty(), issues }
  }
}

#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
  pub passage: SectionReport,
  pub questions: SectionReport,
  pub answers: SectionReport,
}

/// Validate the exam's structure. Returns the overall verdict alongside the
/// per-section report.
pub fn validate_exam(exam: &Exam) -> (bool, ValidationReport) {
  let report = ValidationReport {
    passage: SectionReport::from_issues(check_passage(exam)),
    questions: SectionReport::from_issues(check_questions(exam)),
    answers: SectionReport::from_issues(check_answers(exam)),
  };
  let valid = report.passage.valid && report.questions.valid && report.answers.valid;
  (valid, report)
}

fn check_passage(exam: &Exam) -> Vec<String> {
  let mut issues = Vec::new();
  let p = &exam.reading_passage;

  if p.title.trim().is_empty() {
    issues.push("passage title is empty".into());
  }
  if p.content.trim().is_empty() {
    issues.push("passage content is empty".into());
  }
  if p.topic.trim().is_empty() {
    issues.push("passage topic is empty".into());
  }

  let words = count_words(&p.content);
  let (min, max) = exam.passage_type.word_band();
  // Generation overshoot is tolerated up to 20% past the band ceiling.
  let ceiling = max + max / 5;
  if words < min || words > ceiling {
    issues.push(format!(
      "passage word count {} outside acceptable range [{}, {}]",
      words, min, ceiling
    ));
  }

  issues
}

fn check_questions(exam: &Exam) -> Vec<String> {
  let mut issues = Vec::new();

  if exam.tasks.is_empty() {
    issues.push("exam has no question tasks".into());
    return issues;
  }

  let mut seen = BTreeSet::new();
  let mut total = 0usize;

  for task in &exam.tasks {
    if task.questions.is_empty() {
      issues.push(format!("task '{}' has no questions", task.task_type));
      continue;
    }
    for q in &task.questions {
      total += 1;
      let Some(obj) = q.as_object() else {
        issues.push(format!("task '{}' contains a non-object question", task.task_type));
        continue;
      };
      if !ANSWER_FIELDS.iter().any(|f| obj.contains_key(*f)) {
        issues.push(format!(
          "task '{}' question {} carries no recognized answer field",
          task.task_type, total
        ));
      }
      // Numbers are constrained only when present; "number" is an accepted
      // alternate spelling.
      let number = obj
        .get("question_number")
        .or_else(|| obj.get("number"))
        .and_then(Value::as_u64);
      if let Some(n) = number {
        if !seen.insert(n) {
          issues.push(format!("duplicate question number {}", n));
        }
      }
    }
  }

  // Numbers must form 1..=max with no gaps when they were all present.
  if let (Some(&first), Some(&last)) = (seen.iter().next(), seen.iter().next_back()) {
    if first != 1 {
      issues.push(format!("question numbering starts at {} instead of 1", first));
    }
    if seen.len() as u64 != last - first + 1 {
      issues.push("question numbering has gaps".into());
    }
  }

  if total != exam.total_questions {
    issues.push(format!(
      "exam declares {} questions but tasks contain {}",
      exam.total_questions, total
    ));
  }

  issues
}

fn check_answers(exam: &Exam) -> Vec<String> {
  let mut issues = Vec::new();

  let Some(key) = &exam.answers else {
    issues.push("exam has no answer key".into());
    return issues;
  };

  if key.total_questions != exam.total_questions {
    issues.push(format!(
      "answer key declares {} questions but exam declares {}",
      key.total_questions, exam.total_questions
    ));
  }

  let counted: usize = key.tasks.iter().map(|t| t.answers.len()).sum();
  if counted != exam.total_questions {
    issues.push(format!(
      "answer key holds {} entries for {} questions",
      counted, exam.total_questions
    ));
  }

  for task in &key.tasks {
    for entry in &task.answers {
      if entry.answer.is_null() {
        issues.push(format!("question {} has a null answer", entry.question));
      }
    }
  }

  issues
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::answers::extract_answers;
  use crate::domain::{Passage, PassageType, QuestionBlock};
  use crate::question_types::QuestionTypeKey;
  use serde_json::json;

  fn passage_with_words(n: usize) -> Passage {
    Passage {
      title: "On Bees".into(),
      content: vec!["word"; n].join(" "),
      topic: "apiology".into(),
      word_count: n,
    }
  }

  fn well_formed_exam() -> Exam {
    let tasks = vec![
      QuestionBlock {
        task_type: "True/False/Not Given".into(),
        task_key: QuestionTypeKey::TrueFalseNotGiven,
        questions: (1..=4)
          .map(|n| json!({"question_number": n, "statement": "s", "answer": "TRUE"}))
          .collect(),
        extra: serde_json::Map::new(),
      },
      QuestionBlock {
        task_type: "Short Answer Questions".into(),
        task_key: QuestionTypeKey::ShortAnswer,
        questions: (5..=8)
          .map(|n| json!({"question_number": n, "question_text": "q", "answer": "a"}))
          .collect(),
        extra: serde_json::Map::new(),
      },
    ];
    let answers = extract_answers(&tasks);
    Exam {
      exam_type: "reading".into(),
      passage_type: PassageType::One,
      reading_passage: passage_with_words(800),
      total_questions: 8,
      tasks,
      answers: Some(answers),
    }
  }

  #[test]
  fn well_formed_exam_passes() {
    let (valid, report) = validate_exam(&well_formed_exam());
    assert!(valid, "{:?}", report);
  }

  #[test]
  fn short_passage_fails_word_band() {
    let mut exam = well_formed_exam();
    exam.reading_passage = passage_with_words(650);
    let (valid, report) = validate_exam(&exam);
    assert!(!valid);
    assert!(!report.passage.valid);
    assert!(report.questions.valid);
  }

  #[test]
  fn overshoot_within_twenty_percent_is_tolerated() {
    let mut exam = well_formed_exam();
    // Type 1 band tops at 900; 1080 is exactly the tolerated ceiling.
    exam.reading_passage = passage_with_words(1080);
    let (valid, _) = validate_exam(&exam);
    assert!(valid);
    exam.reading_passage = passage_with_words(1081);
    let (valid, _) = validate_exam(&exam);
    assert!(!valid);
  }

  #[test]
  fn answer_count_mismatch_is_reported() {
    let mut exam = well_formed_exam();
    exam.total_questions = 9;
    let (valid, report) = validate_exam(&exam);
    assert!(!valid);
    assert!(report.answers.issues.iter().any(|i| i.contains("8 entries for 9")));
    assert!(report
      .questions
      .issues
      .iter()
      .any(|i| i.contains("declares 9 questions but tasks contain 8")));
  }

  #[test]
  fn duplicate_and_gapped_numbering_is_caught() {
    let mut exam = well_formed_exam();
    exam.tasks[1].questions[0]["question_number"] = json!(4);
    let (valid, report) = validate_exam(&exam);
    assert!(!valid);
    assert!(report.questions.issues.iter().any(|i| i.contains("duplicate")));
    assert!(report.questions.issues.iter().any(|i| i.contains("gaps")));
  }

  #[test]
  fn unnumbered_questions_and_the_number_alias_are_tolerated() {
    let mut exam = well_formed_exam();
    // Alternate key spelling still participates in the contiguity check.
    let obj = exam.tasks[0].questions[0].as_object_mut().unwrap();
    let n = obj.remove("question_number").unwrap();
    obj.insert("number".into(), n);
    // A question with no number at all is simply skipped by the check.
    exam.tasks[1].questions[3].as_object_mut().unwrap().remove("question_number");
    let (valid, report) = validate_exam(&exam);
    assert!(valid, "{:?}", report);
  }

  #[test]
  fn missing_answer_field_is_caught() {
    let mut exam = well_formed_exam();
    let obj = exam.tasks[0].questions[0].as_object_mut().unwrap();
    obj.remove("answer");
    let (valid, report) = validate_exam(&exam);
    assert!(!valid);
    assert!(report
      .questions
      .issues
      .iter()
      .any(|i| i.contains("no recognized answer field")));
  }

  #[test]
  fn missing_answer_key_is_fatal_to_answers_section() {
    let mut exam = well_formed_exam();
    exam.answers = None;
    let (valid, report) = validate_exam(&exam);
    assert!(!valid);
    assert_eq!(report.answers.issues, vec!["exam has no answer key".to_string()]);
  }
}
