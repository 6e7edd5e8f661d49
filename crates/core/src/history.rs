//! HistoryStore trait: persisted conversation state for one project.
//!
//! An append-only message log plus a rolling free-text summary. When the
//! log grows past its threshold the caller evicts old turns with
//! [`HistoryStore::compress`] and folds them into the summary.

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::message::{Message, Role};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// A human-readable name for this store (e.g. "file", "in_memory").
    fn name(&self) -> &str;

    /// The newest `limit` messages, oldest first.
    async fn get_messages(&self, limit: usize) -> std::result::Result<Vec<Message>, HistoryError>;

    /// Append a message.
    async fn add_message(&self, role: Role, content: &str) -> std::result::Result<(), HistoryError>;

    /// Number of stored messages.
    async fn len(&self) -> std::result::Result<usize, HistoryError>;

    /// Whether the log has outgrown its threshold.
    async fn needs_compression(&self) -> std::result::Result<bool, HistoryError>;

    /// Evict everything but the newest `keep_recent` messages and return the
    /// evicted ones, oldest first.
    async fn compress(&self, keep_recent: usize) -> std::result::Result<Vec<Message>, HistoryError>;

    /// The rolling summary, empty if none has been written.
    async fn get_summary(&self) -> std::result::Result<String, HistoryError>;

    async fn set_summary(&self, summary: &str) -> std::result::Result<(), HistoryError>;

    /// Drop all messages and the summary.
    async fn clear(&self) -> std::result::Result<(), HistoryError>;
}
