//! Minimal OpenAI-compatible client for exam generation.
//!
//! We only call chat.completions and always request a strict JSON object.
//! Model output is defensively repaired (markdown fences, comments, trailing
//! commas) before parsing; a still-broken payload triggers one corrective
//! re-ask. Calls are instrumented and log model names, latencies, and
//! response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Passage, PassageType, QuestionBlock, TaskPlan};
use crate::question_types::type_info;
use crate::retry::RetryPolicy;
use crate::util::{count_words, fill_template, trunc_for_log};

const PASSAGE_SCHEMA: &str = r#"{"title": string, "content": string, "topic": string}"#;

#[derive(Clone)]
pub struct LlmClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub retry: RetryPolicy,
}

impl LlmClient {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .ok()?;

    Some(Self {
      client,
      api_key,
      base_url,
      fast_model,
      strong_model,
      retry: RetryPolicy::default(),
    })
  }

  /// One chat.completions round-trip with a JSON response_format hint.
  async fn chat_raw(&self, model: &str, messages: Vec<ChatMessageReq>) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      temperature: 0.7,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "acaread-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_backend_error(&body).unwrap_or(body);
      return Err(format!("completion backend HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Backend usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    Ok(text)
  }

  /// JSON-object completion with repair and a single corrective re-ask.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json(&self, model: &str, system: &str, user: &str) -> Result<Value, String> {
    let messages = vec![
      ChatMessageReq { role: "system".into(), content: system.into() },
      ChatMessageReq { role: "user".into(), content: user.into() },
    ];
    let text = self.chat_raw(model, messages.clone()).await?;

    let parse_err = match parse_lenient(&text) {
      Ok(v) => return Ok(v),
      Err(e) => e,
    };

    warn!(target: "exam", error = %parse_err, response_len = text.len(), "Malformed JSON from backend, re-asking");
    let mut follow_up = messages;
    follow_up.push(ChatMessageReq { role: "assistant".into(), content: text });
    follow_up.push(ChatMessageReq {
      role: "user".into(),
      content: format!(
        "Your previous response was not valid JSON ({}). Return ONLY the corrected JSON object, nothing else.",
        parse_err
      ),
    });
    let retry_text = self.chat_raw(model, follow_up).await?;
    parse_lenient(&retry_text).map_err(|e| format!("JSON parse error after re-ask: {}", e))
  }

  // --- High-level helpers (domain-specialized) ---

  /// Generate the reading passage for one register from (pre-truncated)
  /// source text. The returned word count is always recomputed here; a
  /// below-band result is a warning, not an error.
  #[instrument(level = "info", skip(self, prompts, source), fields(model = %self.strong_model, source_len = source.len()))]
  pub async fn generate_passage(
    &self,
    prompts: &Prompts,
    passage_type: PassageType,
    source: &str,
  ) -> Result<Passage, String> {
    let (min_words, max_words) = passage_type.word_band();
    let user = fill_template(&prompts.passage_user_template, &[
      ("min_words", &min_words.to_string()),
      ("max_words", &max_words.to_string()),
      ("passage_type", &u8::from(passage_type).to_string()),
      ("style", passage_type.style()),
      ("source", source),
      ("schema", PASSAGE_SCHEMA),
    ]);

    let start = std::time::Instant::now();
    let result = self
      .retry
      .run("generate_passage", || {
        self.chat_json(&self.strong_model, &prompts.passage_system, &user)
      })
      .await;
    let elapsed = start.elapsed();

    let value = match result {
      Ok(v) => v,
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during passage generation");
        return Err(format!("Passage generation failed: {e}"));
      }
    };

    let mut passage: Passage =
      serde_json::from_value(value).map_err(|e| format!("passage shape mismatch: {}", e))?;
    passage.word_count = count_words(&passage.content);
    if passage.word_count < min_words {
      warn!(target: "exam", words = passage.word_count, min_words, "Generated passage below word band");
    }
    info!(?elapsed, words = passage.word_count, title_preview = %trunc_for_log(&passage.title, 40), "Passage generated");
    Ok(passage)
  }

  /// Generate one task's questions. The prompt pins the exact count and the
  /// global number range; a count mismatch is logged, not fatal (the caller
  /// reconciles numbering against the plan).
  #[instrument(level = "info", skip(self, prompts, passage), fields(model = %self.strong_model, task = %plan.type_name, count = plan.question_count))]
  pub async fn generate_question_block(
    &self,
    prompts: &Prompts,
    passage: &Passage,
    plan: &TaskPlan,
  ) -> Result<QuestionBlock, String> {
    let info = type_info(plan.type_key);
    let user = fill_template(&prompts.questions_user_template, &[
      ("count", &plan.question_count.to_string()),
      ("type_name", info.name),
      ("title", &passage.title),
      ("content", &passage.content),
      ("start", &plan.start_number.to_string()),
      ("end", &plan.end_number().to_string()),
      ("schema", info.schema_hint),
    ]);

    let value = self
      .retry
      .run("generate_questions", || {
        self.chat_json(&self.strong_model, &prompts.questions_system, &user)
      })
      .await
      .map_err(|e| format!("Question generation failed for {}: {e}", plan.type_name))?;

    let Value::Object(mut map) = value else {
      return Err(format!("{} output is not a JSON object", plan.type_name));
    };
    let questions = match map.remove("questions") {
      Some(Value::Array(qs)) => qs,
      _ => return Err(format!("{} output has no questions array", plan.type_name)),
    };
    if questions.len() != plan.question_count {
      warn!(target: "exam", task = %plan.type_name, expected = plan.question_count, got = questions.len(), "Question count mismatch");
    }

    map.remove("task_type");
    map.remove("task_key");
    Ok(QuestionBlock {
      task_type: info.name.to_string(),
      task_key: plan.type_key,
      questions,
      extra: map,
    })
  }
}

// --- Chat DTOs ---

#[derive(Serialize, Clone)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize, Clone)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize, Clone)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from the backend's error body.
fn extract_backend_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

/// Parse model output as JSON, falling back to a repaired copy when the
/// direct parse fails.
fn parse_lenient(text: &str) -> Result<Value, String> {
  if let Ok(v) = serde_json::from_str::<Value>(text) {
    return Ok(v);
  }
  let repaired = repair_json_text(text);
  serde_json::from_str::<Value>(&repaired).map_err(|e| e.to_string())
}

/// Best-effort cleanup of the junk models wrap around JSON: markdown fences,
/// line/block comments, trailing commas. Only ever applied to text that
/// already failed a strict parse, so over-eager edits cannot corrupt a
/// well-formed payload.
fn repair_json_text(text: &str) -> String {
  let mut s = text.trim();

  if let Some(rest) = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")) {
    s = rest;
  }
  if let Some(rest) = s.strip_suffix("```") {
    s = rest;
  }
  let s = s.trim();

  // Comments and trailing commas, outside of string literals.
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars().peekable();
  let mut in_string = false;
  let mut escaped = false;
  while let Some(c) = chars.next() {
    if in_string {
      out.push(c);
      if escaped {
        escaped = false;
      } else if c == '\\' {
        escaped = true;
      } else if c == '"' {
        in_string = false;
      }
      continue;
    }
    match c {
      '"' => {
        in_string = true;
        out.push(c);
      }
      '/' if chars.peek() == Some(&'/') => {
        for n in chars.by_ref() {
          if n == '\n' {
            out.push('\n');
            break;
          }
        }
      }
      '/' if chars.peek() == Some(&'*') => {
        chars.next();
        let mut prev = ' ';
        for n in chars.by_ref() {
          if prev == '*' && n == '/' {
            break;
          }
          prev = n;
        }
      }
      ',' => {
        // Drop the comma when the next significant character closes a scope.
        let mut lookahead = chars.clone();
        let mut next_sig = None;
        for n in lookahead.by_ref() {
          if !n.is_whitespace() {
            next_sig = Some(n);
            break;
          }
        }
        if !matches!(next_sig, Some('}') | Some(']')) {
          out.push(',');
        }
      }
      _ => out.push(c),
    }
  }
  out
}
