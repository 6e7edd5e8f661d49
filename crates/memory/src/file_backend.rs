//! File-based history store: one JSON document per project.
//!
//! Storage location: `<project>/.llmcode/history.json`
//!
//! The log is loaded once on creation and flushed to disk on every
//! mutation. A missing or unreadable file starts an empty history rather
//! than failing the session.

use async_trait::async_trait;
use llmcode_config::STATE_DIR;
use llmcode_core::error::HistoryError;
use llmcode_core::history::HistoryStore;
use llmcode_core::message::{Message, Role};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::conversation::ConversationLog;

pub const HISTORY_FILE: &str = "history.json";

pub struct FileHistory {
    path: PathBuf,
    max_messages: usize,
    log: Arc<RwLock<ConversationLog>>,
}

impl FileHistory {
    /// Open (or start) the history stored at `path`.
    pub fn new(path: PathBuf, max_messages: usize) -> Self {
        let log = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = log.messages.len(), "History loaded");
        Self {
            path,
            max_messages,
            log: Arc::new(RwLock::new(log)),
        }
    }

    /// The history belonging to `project_dir`.
    pub fn for_project(project_dir: &Path, max_messages: usize) -> Self {
        Self::new(Self::project_path(project_dir), max_messages)
    }

    pub fn project_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join(HISTORY_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> ConversationLog {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return ConversationLog::default(),
        };
        match serde_json::from_str(&content) {
            Ok(log) => log,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted history file");
                ConversationLog::default()
            }
        }
    }

    async fn flush(&self) -> Result<(), HistoryError> {
        let log = self.log.read().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                HistoryError::Storage(format!("Failed to create history directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(&*log)
            .map_err(|e| HistoryError::Storage(format!("Failed to serialize history: {e}")))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to write history file: {e}")))
    }
}

#[async_trait]
impl HistoryStore for FileHistory {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_messages(&self, limit: usize) -> Result<Vec<Message>, HistoryError> {
        Ok(self.log.read().await.recent(limit))
    }

    async fn add_message(&self, role: Role, content: &str) -> Result<(), HistoryError> {
        self.log.write().await.push(role, content);
        self.flush().await
    }

    async fn len(&self) -> Result<usize, HistoryError> {
        Ok(self.log.read().await.messages.len())
    }

    async fn needs_compression(&self) -> Result<bool, HistoryError> {
        Ok(self.log.read().await.messages.len() > self.max_messages)
    }

    async fn compress(&self, keep_recent: usize) -> Result<Vec<Message>, HistoryError> {
        let evicted = self.log.write().await.evict(keep_recent);
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), keep_recent, "History compressed");
            self.flush().await?;
        }
        Ok(evicted)
    }

    async fn get_summary(&self) -> Result<String, HistoryError> {
        Ok(self.log.read().await.summary.clone())
    }

    async fn set_summary(&self, summary: &str) -> Result<(), HistoryError> {
        self.log.write().await.set_summary(summary);
        self.flush().await
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        self.log.write().await.clear();
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::for_project(dir.path(), 40);
        history.add_message(Role::User, "hello").await.unwrap();
        history.add_message(Role::Assistant, "hi there").await.unwrap();
        history.set_summary("greetings exchanged").await.unwrap();

        let reopened = FileHistory::for_project(dir.path(), 40);
        let messages = reopened.get_messages(20).await.unwrap();
        assert_eq!(messages, vec![Message::user("hello"), Message::assistant("hi there")]);
        assert_eq!(reopened.get_summary().await.unwrap(), "greetings exchanged");
        assert!(dir.path().join(".llmcode/history.json").exists());
    }

    #[tokio::test]
    async fn file_format_is_messages_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::for_project(dir.path(), 40);
        history.add_message(Role::User, "q").await.unwrap();

        let raw = std::fs::read_to_string(history.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["messages"][0]["role"], "user");
        assert_eq!(doc["messages"][0]["content"], "q");
        assert_eq!(doc["summary"], "");
    }

    #[tokio::test]
    async fn corrupted_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = FileHistory::project_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let history = FileHistory::new(path, 40);
        assert_eq!(history.len().await.unwrap(), 0);
        history.add_message(Role::User, "fresh").await.unwrap();
        assert_eq!(history.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn compression_threshold_and_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::for_project(dir.path(), 4);
        for i in 0..5 {
            history.add_message(Role::User, &format!("m{i}")).await.unwrap();
        }
        assert!(history.needs_compression().await.unwrap());

        let evicted = history.compress(2).await.unwrap();
        assert_eq!(evicted.len(), 3);
        assert_eq!(evicted[0].content, "m0");
        assert!(!history.needs_compression().await.unwrap());

        let reopened = FileHistory::for_project(dir.path(), 4);
        assert_eq!(reopened.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_removes_messages_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::for_project(dir.path(), 40);
        history.add_message(Role::User, "x").await.unwrap();
        history.set_summary("s").await.unwrap();
        history.clear().await.unwrap();

        let reopened = FileHistory::for_project(dir.path(), 40);
        assert_eq!(reopened.len().await.unwrap(), 0);
        assert!(reopened.get_summary().await.unwrap().is_empty());
    }
}
