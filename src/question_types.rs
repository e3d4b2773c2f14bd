//! Static registry of the nine IELTS Reading question types.
//!
//! Each entry carries the display name, a schema hint sent to the completion
//! backend, per-type question-count bounds, and the single field name that
//! holds the correct answer in that type's generated output. Declaring the
//! answer field per type makes answer extraction a total function over the
//! type tag instead of a priority probe across untyped fields.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionTypeKey {
  MultipleChoice,
  TrueFalseNotGiven,
  YesNoNotGiven,
  MatchingHeadings,
  MatchingInformation,
  MatchingFeatures,
  SentenceCompletion,
  SummaryCompletion,
  ShortAnswer,
}

pub struct QuestionTypeInfo {
  pub key: QuestionTypeKey,
  pub name: &'static str,
  pub min_questions: usize,
  pub max_questions: usize,
  /// The one field in a generated question object that carries the answer.
  pub answer_field: &'static str,
  /// Compact JSON-shape description embedded in the generation request.
  pub schema_hint: &'static str,
}

pub const REGISTRY: &[QuestionTypeInfo] = &[
  QuestionTypeInfo {
    key: QuestionTypeKey::MultipleChoice,
    name: "Multiple Choice",
    min_questions: 3,
    max_questions: 6,
    answer_field: "correct_answer",
    schema_hint: r#"{"questions": [{"question_number": int, "question_text": string, "options": [{"id": "A"|"B"|"C"|"D", "text": string}], "correct_answer": "A"|"B"|"C"|"D", "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::TrueFalseNotGiven,
    name: "True/False/Not Given",
    min_questions: 4,
    max_questions: 6,
    answer_field: "answer",
    schema_hint: r#"{"instructions": string, "questions": [{"question_number": int, "statement": string, "answer": "TRUE"|"FALSE"|"NOT GIVEN", "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::YesNoNotGiven,
    name: "Yes/No/Not Given",
    min_questions: 4,
    max_questions: 6,
    answer_field: "answer",
    schema_hint: r#"{"instructions": string, "questions": [{"question_number": int, "statement": string, "answer": "YES"|"NO"|"NOT GIVEN", "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::MatchingHeadings,
    name: "Matching Headings",
    min_questions: 4,
    max_questions: 7,
    answer_field: "correct_heading_id",
    schema_hint: r#"{"headings": [{"id": "i"|"ii"|..., "text": string}], "questions": [{"question_number": int, "paragraph": "A"|"B"|..., "correct_heading_id": string, "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::MatchingInformation,
    name: "Matching Information",
    min_questions: 4,
    max_questions: 6,
    answer_field: "correct_paragraph",
    schema_hint: r#"{"instructions": string, "questions": [{"question_number": int, "statement": string, "correct_paragraph": "A"|"B"|..., "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::MatchingFeatures,
    name: "Matching Features",
    min_questions: 3,
    max_questions: 5,
    answer_field: "correct_feature_id",
    schema_hint: r#"{"features": [{"id": "A"|"B"|..., "text": string}], "questions": [{"question_number": int, "statement": string, "correct_feature_id": string, "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::SentenceCompletion,
    name: "Sentence Completion",
    min_questions: 3,
    max_questions: 5,
    answer_field: "answer",
    schema_hint: r#"{"instructions": string, "questions": [{"question_number": int, "sentence": string, "answer": string, "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::SummaryCompletion,
    name: "Summary Completion",
    min_questions: 4,
    max_questions: 6,
    answer_field: "answer",
    schema_hint: r#"{"instructions": string, "summary": string, "questions": [{"question_number": int, "gap_id": int, "answer": string, "explanation": string}]}"#,
  },
  QuestionTypeInfo {
    key: QuestionTypeKey::ShortAnswer,
    name: "Short Answer Questions",
    min_questions: 3,
    max_questions: 5,
    answer_field: "answer",
    schema_hint: r#"{"instructions": string, "questions": [{"question_number": int, "question_text": string, "answer": string, "explanation": string}]}"#,
  },
];

/// Every answer-bearing field any type can emit. The validator and the
/// sanitization boundary recognize these independently of the registry tags.
pub const ANSWER_FIELDS: &[&str] = &[
  "correct_answer",
  "answer",
  "correct_feature_id",
  "correct_heading_id",
  "correct_paragraph",
  "correct_ending_id",
];

pub fn type_info(key: QuestionTypeKey) -> &'static QuestionTypeInfo {
  REGISTRY
    .iter()
    .find(|t| t.key == key)
    .expect("registry covers every QuestionTypeKey variant")
}

pub fn all_keys() -> Vec<QuestionTypeKey> {
  REGISTRY.iter().map(|t| t.key).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_covers_nine_types_with_sane_bounds() {
    assert_eq!(REGISTRY.len(), 9);
    for info in REGISTRY {
      assert!(info.min_questions >= 3);
      assert!(info.max_questions >= info.min_questions);
      assert!(ANSWER_FIELDS.contains(&info.answer_field), "{}", info.name);
    }
  }

  #[test]
  fn type_info_resolves_every_key() {
    for key in all_keys() {
      assert_eq!(type_info(key).key, key);
    }
  }

  #[test]
  fn keys_serialize_as_snake_case() {
    let s = serde_json::to_string(&QuestionTypeKey::TrueFalseNotGiven).unwrap();
    assert_eq!(s, "\"true_false_not_given\"");
  }
}
