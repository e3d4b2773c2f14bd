//! Loading service configuration (prompts + pipeline settings) from TOML.
//!
//! See `ServiceConfig` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub pipeline: PipelineSettings,
}

/// Tunables for the generation pipeline. Defaults match standard
/// IELTS Reading conventions; override in TOML when needed.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineSettings {
  /// Base directory for per-session artifact folders.
  #[serde(default = "default_sessions_dir")]
  pub sessions_dir: String,
  /// Character budget for the source prefix embedded in generation requests.
  #[serde(default = "default_source_char_budget")]
  pub source_char_budget: usize,
}

fn default_sessions_dir() -> String {
  "./sessions".into()
}

fn default_source_char_budget() -> usize {
  8000
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      sessions_dir: default_sessions_dir(),
      source_char_budget: default_source_char_budget(),
    }
  }
}

/// Prompts used by the completion backend. Defaults reproduce the standard
/// exam-writer instructions; override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub passage_system: String,
  pub passage_user_template: String,
  pub questions_system: String,
  pub questions_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      passage_system:
        "You are an IELTS exam writer. You produce formal academic English and respond ONLY with strict JSON."
          .into(),
      passage_user_template: "Create a reading passage based on the source material below.\n\n\
REQUIREMENTS:\n\
- Write a coherent, academic passage between {min_words}-{max_words} words\n\
- Passage Type {passage_type}: {style}\n\
- Use formal academic English\n\
- Structure with clear paragraphs (label them A, B, C, etc. for reference)\n\
- Do NOT include any questions\n\
- Output ONLY valid JSON matching the schema\n\n\
SOURCE MATERIAL:\n{source}\n\n\
OUTPUT SCHEMA:\n{schema}\n\n\
Return ONLY the JSON object, no explanation."
        .into(),
      questions_system:
        "You are an IELTS exam writer. You produce questions answerable from the passage and respond ONLY with strict JSON."
          .into(),
      questions_user_template: "Generate {count} {type_name} questions.\n\n\
PASSAGE:\nTitle: {title}\n\n{content}\n\n\
REQUIREMENTS:\n\
- Create exactly {count} questions numbered {start} to {end}\n\
- Questions must be answerable from the passage text\n\
- Each question must have a clear explanation citing evidence\n\
- Follow standard IELTS format for {type_name}\n\
- Output ONLY valid JSON matching the schema\n\n\
OUTPUT SCHEMA:\n{schema}\n\n\
Return ONLY the JSON object, no explanation."
        .into(),
    }
  }
}

/// Attempt to load `ServiceConfig` from ACAREAD_CONFIG_PATH. On any
/// parsing/IO error, returns None and the defaults apply.
pub fn load_config_from_env() -> Option<ServiceConfig> {
  let path = std::env::var("ACAREAD_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ServiceConfig>(&s) {
      Ok(cfg) => {
        info!(target: "acaread_backend", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "acaread_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "acaread_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
