//! Application state: session store, prompts, completion backend, pipeline.
//!
//! This module owns:
//!   - the filesystem session store (metadata cache + artifacts)
//!   - the prompts struct (from TOML or defaults)
//!   - the optional completion backend client
//!   - the exam pipeline wiring all of it together
//!
//! Without a backend the HTTP surface still works: ingestion, status, and
//! stored artifacts are served; generation requests fail with a clear error.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::load_config_from_env;
use crate::error::AppResult;
use crate::llm::LlmClient;
use crate::pipeline::ExamPipeline;
use crate::store::FsSessionStore;

#[derive(Clone)]
pub struct AppState {
  pub pipeline: ExamPipeline<FsSessionStore>,
  /// Shared client for URL ingestion; separate from the backend client so
  /// fetch timeouts stay independent of completion timeouts.
  pub http_client: reqwest::Client,
}

impl AppState {
  /// Build state from env: load config, open the session store, init the
  /// completion backend.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> AppResult<Self> {
    let cfg = load_config_from_env().unwrap_or_default();
    let store = FsSessionStore::open(&cfg.pipeline.sessions_dir)?;

    let llm = LlmClient::from_env();
    if let Some(client) = &llm {
      info!(target: "acaread_backend", base_url = %client.base_url, fast_model = %client.fast_model, strong_model = %client.strong_model, "Completion backend enabled.");
    } else {
      info!(target: "acaread_backend", "Completion backend disabled (no OPENAI_API_KEY). Generation requests will fail.");
    }

    let pipeline = ExamPipeline {
      store: Arc::new(store),
      llm,
      prompts: cfg.prompts,
      settings: cfg.pipeline,
    };

    let http_client = reqwest::Client::builder()
      .timeout(std::time::Duration::from_secs(30))
      .build()
      .unwrap_or_default();

    Ok(Self { pipeline, http_client })
  }

  pub fn store(&self) -> &FsSessionStore {
    &self.pipeline.store
  }
}
