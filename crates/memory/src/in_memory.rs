//! In-memory history: for tests and sessions that should leave no trace.

use async_trait::async_trait;
use llmcode_core::error::HistoryError;
use llmcode_core::history::HistoryStore;
use llmcode_core::message::{Message, Role};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::conversation::ConversationLog;

pub struct InMemoryHistory {
    max_messages: usize,
    log: Arc<RwLock<ConversationLog>>,
}

impl InMemoryHistory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            log: Arc::new(RwLock::new(ConversationLog::default())),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(llmcode_config::HistoryConfig::default().max_messages)
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_messages(&self, limit: usize) -> Result<Vec<Message>, HistoryError> {
        Ok(self.log.read().await.recent(limit))
    }

    async fn add_message(&self, role: Role, content: &str) -> Result<(), HistoryError> {
        self.log.write().await.push(role, content);
        Ok(())
    }

    async fn len(&self) -> Result<usize, HistoryError> {
        Ok(self.log.read().await.messages.len())
    }

    async fn needs_compression(&self) -> Result<bool, HistoryError> {
        Ok(self.log.read().await.messages.len() > self.max_messages)
    }

    async fn compress(&self, keep_recent: usize) -> Result<Vec<Message>, HistoryError> {
        Ok(self.log.write().await.evict(keep_recent))
    }

    async fn get_summary(&self) -> Result<String, HistoryError> {
        Ok(self.log.read().await.summary.clone())
    }

    async fn set_summary(&self, summary: &str) -> Result<(), HistoryError> {
        self.log.write().await.set_summary(summary);
        Ok(())
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        self.log.write().await.clear();
        Ok(())
    }
}
