//! Session persistence: metadata plus per-session artifact files.
//!
//! Layout under the store root, one directory per session:
//!   <id>/metadata.json        — the `Session` record
//!   <id>/source.md            — raw ingested text
//!   <id>/extracted.md         — cleaned text after preprocessing
//!   <id>/passage.json         — generated passage
//!   <id>/questions/task_N.json — one generated block per task (1-based)
//!   <id>/answers.json         — unified answer key
//!   <id>/exam.json            — assembled exam (with answers)
//!
//! Metadata is mirrored in an in-memory map so status polling never hits
//! disk. Writes are last-write-wins; the single-writer discipline lives in
//! the orchestrator, not here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{AnswerKey, Exam, Passage, QuestionBlock, Session, SessionStatus, StageKind};
use crate::error::{AppError, AppResult};

const ID_LEN: usize = 8;

/// Short lowercase alphanumeric session id (uuid4 hex prefix).
pub fn new_session_id() -> String {
  uuid::Uuid::new_v4().simple().to_string()[..ID_LEN].to_string()
}

#[derive(Clone, Copy, Debug)]
pub enum TextArtifact {
  Source,
  Extracted,
}

impl TextArtifact {
  fn file_name(self) -> &'static str {
    match self {
      TextArtifact::Source => "source.md",
      TextArtifact::Extracted => "extracted.md",
    }
  }
}

pub trait SessionStore: Send + Sync {
  fn create(&self, session: Session) -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn get(&self, id: &str) -> impl std::future::Future<Output = AppResult<Session>> + Send;
  fn update(&self, session: &Session) -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn list(&self) -> impl std::future::Future<Output = AppResult<Vec<Session>>> + Send;
  fn delete(&self, id: &str) -> impl std::future::Future<Output = AppResult<()>> + Send;

  fn save_text(
    &self,
    id: &str,
    kind: TextArtifact,
    text: &str,
  ) -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn load_text(
    &self,
    id: &str,
    kind: TextArtifact,
  ) -> impl std::future::Future<Output = AppResult<String>> + Send;

  fn save_passage(
    &self,
    id: &str,
    passage: &Passage,
  ) -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn load_passage(&self, id: &str) -> impl std::future::Future<Output = AppResult<Passage>> + Send;

  fn clear_question_blocks(&self, id: &str)
    -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn save_question_block(
    &self,
    id: &str,
    index: usize,
    block: &QuestionBlock,
  ) -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn load_question_blocks(
    &self,
    id: &str,
  ) -> impl std::future::Future<Output = AppResult<Vec<QuestionBlock>>> + Send;

  fn save_answer_key(
    &self,
    id: &str,
    key: &AnswerKey,
  ) -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn load_answer_key(&self, id: &str)
    -> impl std::future::Future<Output = AppResult<AnswerKey>> + Send;

  fn save_exam(&self, id: &str, exam: &Exam)
    -> impl std::future::Future<Output = AppResult<()>> + Send;
  fn load_exam(&self, id: &str) -> impl std::future::Future<Output = AppResult<Exam>> + Send;

  /// Advance status/progress. Progress only moves forward within a run;
  /// a smaller value than the stored one is kept as-is.
  fn update_status(
    &self,
    id: &str,
    status: SessionStatus,
    progress: u8,
  ) -> impl std::future::Future<Output = AppResult<Session>> + Send
  where
    Self: Sized,
  {
    async move {
      let mut session = self.get(id).await?;
      session.status = status;
      session.progress = session.progress.max(progress);
      session.updated_at = chrono::Utc::now();
      self.update(&session).await?;
      Ok(session)
    }
  }

  /// Record a stage completion marker.
  fn mark_stage(
    &self,
    id: &str,
    stage: StageKind,
  ) -> impl std::future::Future<Output = AppResult<Session>> + Send
  where
    Self: Sized,
  {
    async move {
      let mut session = self.get(id).await?;
      session.stages.mark(stage);
      session.updated_at = chrono::Utc::now();
      self.update(&session).await?;
      Ok(session)
    }
  }

  /// Record a failed run: status, error message, timestamp.
  fn mark_failed(
    &self,
    id: &str,
    message: &str,
  ) -> impl std::future::Future<Output = AppResult<Session>> + Send
  where
    Self: Sized,
  {
    async move {
      let mut session = self.get(id).await?;
      session.status = SessionStatus::Failed;
      session.error = Some(message.to_string());
      session.updated_at = chrono::Utc::now();
      self.update(&session).await?;
      Ok(session)
    }
  }
}

/// Filesystem-backed store with an in-memory metadata cache.
#[derive(Clone)]
pub struct FsSessionStore {
  root: PathBuf,
  cache: Arc<RwLock<HashMap<String, Session>>>,
}

impl FsSessionStore {
  /// Open (or create) the store root and warm the cache from existing
  /// session directories. Unreadable metadata is skipped with a warning.
  pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
    let root = root.into();
    std::fs::create_dir_all(&root)?;

    let mut cache = HashMap::new();
    for entry in std::fs::read_dir(&root)? {
      let entry = entry?;
      if !entry.file_type()?.is_dir() {
        continue;
      }
      let meta_path = entry.path().join("metadata.json");
      match std::fs::read_to_string(&meta_path) {
        Ok(raw) => match serde_json::from_str::<Session>(&raw) {
          Ok(session) => {
            cache.insert(session.session_id.clone(), session);
          }
          Err(e) => {
            warn!(target: "acaread_backend", path = %meta_path.display(), error = %e, "Skipping unreadable session metadata");
          }
        },
        Err(_) => continue,
      }
    }
    info!(target: "acaread_backend", root = %root.display(), sessions = cache.len(), "Session store opened");

    Ok(Self { root, cache: Arc::new(RwLock::new(cache)) })
  }

  fn session_dir(&self, id: &str) -> PathBuf {
    self.root.join(id)
  }

  fn questions_dir(&self, id: &str) -> PathBuf {
    self.session_dir(id).join("questions")
  }

  async fn write_metadata(&self, session: &Session) -> AppResult<()> {
    let dir = self.session_dir(&session.session_id);
    tokio::fs::create_dir_all(&dir).await?;
    let raw = serde_json::to_vec_pretty(session)?;
    tokio::fs::write(dir.join("metadata.json"), raw).await?;
    Ok(())
  }

  async fn write_json<T: serde::Serialize>(&self, id: &str, name: &str, value: &T) -> AppResult<()> {
    self.require(id).await?;
    let raw = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(self.session_dir(id).join(name), raw).await?;
    Ok(())
  }

  async fn read_json<T: serde::de::DeserializeOwned>(
    &self,
    id: &str,
    name: &str,
    kind: &'static str,
  ) -> AppResult<T> {
    self.require(id).await?;
    let path = self.session_dir(id).join(name);
    let raw = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(AppError::MissingArtifact { session_id: id.to_string(), kind });
      }
      Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&raw)?)
  }

  async fn require(&self, id: &str) -> AppResult<()> {
    if self.cache.read().await.contains_key(id) {
      Ok(())
    } else {
      Err(AppError::SessionNotFound(id.to_string()))
    }
  }
}

impl SessionStore for FsSessionStore {
  async fn create(&self, session: Session) -> AppResult<()> {
    self.write_metadata(&session).await?;
    self.cache.write().await.insert(session.session_id.clone(), session);
    Ok(())
  }

  async fn get(&self, id: &str) -> AppResult<Session> {
    self
      .cache
      .read()
      .await
      .get(id)
      .cloned()
      .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
  }

  async fn update(&self, session: &Session) -> AppResult<()> {
    self.require(&session.session_id).await?;
    self.write_metadata(session).await?;
    self
      .cache
      .write()
      .await
      .insert(session.session_id.clone(), session.clone());
    Ok(())
  }

  async fn list(&self) -> AppResult<Vec<Session>> {
    let mut sessions: Vec<Session> = self.cache.read().await.values().cloned().collect();
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(sessions)
  }

  async fn delete(&self, id: &str) -> AppResult<()> {
    self.require(id).await?;
    tokio::fs::remove_dir_all(self.session_dir(id)).await?;
    self.cache.write().await.remove(id);
    Ok(())
  }

  async fn save_text(&self, id: &str, kind: TextArtifact, text: &str) -> AppResult<()> {
    self.require(id).await?;
    tokio::fs::write(self.session_dir(id).join(kind.file_name()), text).await?;
    Ok(())
  }

  async fn load_text(&self, id: &str, kind: TextArtifact) -> AppResult<String> {
    self.require(id).await?;
    let path = self.session_dir(id).join(kind.file_name());
    match tokio::fs::read_to_string(&path).await {
      Ok(s) => Ok(s),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::MissingArtifact {
        session_id: id.to_string(),
        kind: kind.file_name(),
      }),
      Err(e) => Err(e.into()),
    }
  }

  async fn save_passage(&self, id: &str, passage: &Passage) -> AppResult<()> {
    self.write_json(id, "passage.json", passage).await
  }

  async fn load_passage(&self, id: &str) -> AppResult<Passage> {
    self.read_json(id, "passage.json", "passage").await
  }

  async fn clear_question_blocks(&self, id: &str) -> AppResult<()> {
    self.require(id).await?;
    let dir = self.questions_dir(id);
    match tokio::fs::remove_dir_all(&dir).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  async fn save_question_block(&self, id: &str, index: usize, block: &QuestionBlock) -> AppResult<()> {
    self.require(id).await?;
    let dir = self.questions_dir(id);
    tokio::fs::create_dir_all(&dir).await?;
    let raw = serde_json::to_vec_pretty(block)?;
    tokio::fs::write(dir.join(format!("task_{}.json", index + 1)), raw).await?;
    Ok(())
  }

  async fn load_question_blocks(&self, id: &str) -> AppResult<Vec<QuestionBlock>> {
    self.require(id).await?;
    let dir = self.questions_dir(id);
    let mut rd = match tokio::fs::read_dir(&dir).await {
      Ok(rd) => rd,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(AppError::MissingArtifact { session_id: id.to_string(), kind: "questions" });
      }
      Err(e) => return Err(e.into()),
    };

    let mut indexed: Vec<(usize, QuestionBlock)> = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
      let name = entry.file_name().to_string_lossy().into_owned();
      let Some(idx) = name
        .strip_prefix("task_")
        .and_then(|s| s.strip_suffix(".json"))
        .and_then(|s| s.parse::<usize>().ok())
      else {
        continue;
      };
      let raw = tokio::fs::read_to_string(entry.path()).await?;
      indexed.push((idx, serde_json::from_str(&raw)?));
    }

    if indexed.is_empty() {
      return Err(AppError::MissingArtifact { session_id: id.to_string(), kind: "questions" });
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, b)| b).collect())
  }

  async fn save_answer_key(&self, id: &str, key: &AnswerKey) -> AppResult<()> {
    self.write_json(id, "answers.json", key).await
  }

  async fn load_answer_key(&self, id: &str) -> AppResult<AnswerKey> {
    self.read_json(id, "answers.json", "answers").await
  }

  async fn save_exam(&self, id: &str, exam: &Exam) -> AppResult<()> {
    self.write_json(id, "exam.json", exam).await
  }

  async fn load_exam(&self, id: &str) -> AppResult<Exam> {
    self.read_json(id, "exam.json", "exam").await
  }
}
