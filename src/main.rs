//! Acaread · IELTS-style Reading Exam Backend
//!
//! - Axum HTTP API: document ingestion, background exam generation,
//!   status polling, sanitized exam delivery, answer key on submit
//! - Optional OpenAI-compatible completion backend (via environment)
//!
//! Important env variables:
//!   PORT          : u16 (default 3000)
//!   OPENAI_API_KEY    : enables the completion backend if present
//!   OPENAI_BASE_URL    : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL  : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL   : default "gpt-4o"
//!   ACAREAD_CONFIG_PATH  : path to TOML config (prompts + pipeline settings)
//!   LOG_LEVEL    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod question_types;
mod config;
mod preprocess;
mod strategy;
mod answers;
mod validate;
mod retry;
mod llm;
mod extract;
mod store;
mod pipeline;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (session store, backend client, prompts).
  let state = Arc::new(AppState::new()?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "acaread_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
