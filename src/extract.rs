//! Source ingestion: turn a document reference into plain text.
//!
//! Inline text passes through, files go through a UTF-8 read with a lossy
//! fallback, URLs are fetched over http(s) only. Anything else fails with
//! `AppError::Extraction`, which is fatal to the run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentSource {
  Text { content: String },
  File { path: PathBuf },
  Url { url: String },
}

impl DocumentSource {
  /// Short tag stored on the session record.
  pub fn kind(&self) -> &'static str {
    match self {
      DocumentSource::Text { .. } => "text",
      DocumentSource::File { .. } => "file",
      DocumentSource::Url { .. } => "url",
    }
  }

  /// Display name for the session record.
  pub fn label(&self) -> String {
    match self {
      DocumentSource::Text { .. } => "inline text".into(),
      DocumentSource::File { path } => path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string()),
      DocumentSource::Url { url } => url.clone(),
    }
  }
}

/// Convert the source to text. Empty output counts as failure: a session
/// with nothing to read from cannot proceed.
#[instrument(level = "info", skip(client, source), fields(kind = source.kind()))]
pub async fn extract(client: &reqwest::Client, source: &DocumentSource) -> AppResult<String> {
  let text = match source {
    DocumentSource::Text { content } => content.clone(),
    DocumentSource::File { path } => read_file_text(path)?,
    DocumentSource::Url { url } => fetch_url_text(client, url).await?,
  };

  let text = text.trim().to_string();
  if text.is_empty() {
    return Err(AppError::Extraction(format!("source '{}' yielded no text", source.label())));
  }
  info!(target: "exam", chars = text.len(), "Source extracted");
  Ok(text)
}

fn read_file_text(path: &PathBuf) -> AppResult<String> {
  let bytes = std::fs::read(path)
    .map_err(|e| AppError::Extraction(format!("cannot read {}: {}", path.display(), e)))?;
  match String::from_utf8(bytes) {
    Ok(s) => Ok(s),
    // Lossy decode keeps mostly-text files usable.
    Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
  }
}

async fn fetch_url_text(client: &reqwest::Client, url: &str) -> AppResult<String> {
  if !(url.starts_with("http://") || url.starts_with("https://")) {
    return Err(AppError::Extraction(format!("unsupported URL scheme in '{}'", url)));
  }
  let res = client
    .get(url)
    .send()
    .await
    .map_err(|e| AppError::Extraction(format!("fetch failed for '{}': {}", url, e)))?;
  if !res.status().is_success() {
    return Err(AppError::Extraction(format!("fetch for '{}' returned HTTP {}", url, res.status())));
  }
  res
    .text()
    .await
    .map_err(|e| AppError::Extraction(format!("body read failed for '{}': {}", url, e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> reqwest::Client {
    reqwest::Client::new()
  }

  #[tokio::test]
  async fn inline_text_passes_through_trimmed() {
    let src = DocumentSource::Text { content: "  A document.  ".into() };
    let out = extract(&client(), &src).await.unwrap();
    assert_eq!(out, "A document.");
  }

  #[tokio::test]
  async fn empty_text_is_an_extraction_error() {
    let src = DocumentSource::Text { content: "   ".into() };
    let err = extract(&client(), &src).await.unwrap_err();
    assert!(matches!(err, AppError::Extraction(_)));
  }

  #[tokio::test]
  async fn file_source_reads_utf8() {
    let path = std::env::temp_dir().join(format!("acaread-extract-{}.md", uuid::Uuid::new_v4()));
    std::fs::write(&path, "# Heading\n\nBody text.").unwrap();
    let src = DocumentSource::File { path: path.clone() };
    let out = extract(&client(), &src).await.unwrap();
    assert_eq!(out, "# Heading\n\nBody text.");
    std::fs::remove_file(path).unwrap();
  }

  #[tokio::test]
  async fn missing_file_is_an_extraction_error() {
    let src = DocumentSource::File { path: "/nonexistent/acaread-test.md".into() };
    assert!(extract(&client(), &src).await.is_err());
  }

  #[tokio::test]
  async fn non_http_scheme_is_rejected_without_fetching() {
    let src = DocumentSource::Url { url: "ftp://example.com/doc.md".into() };
    let err = extract(&client(), &src).await.unwrap_err();
    assert!(err.to_string().contains("unsupported URL scheme"));
  }

  #[test]
  fn labels_and_kinds() {
    let f = DocumentSource::File { path: "/tmp/paper.md".into() };
    assert_eq!(f.kind(), "file");
    assert_eq!(f.label(), "paper.md");
    let u = DocumentSource::Url { url: "https://example.com".into() };
    assert_eq!(u.kind(), "url");
  }
}
