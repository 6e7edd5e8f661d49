//! The in-memory shape of a conversation log, shared by every store.

use chrono::{DateTime, Utc};
use llmcode_core::message::{Message, Role};
use serde::{Deserialize, Serialize};

/// Messages plus the rolling summary. This is also the on-disk format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationLog {
    pub fn recent(&self, limit: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages[skip..].to_vec()
    }

    pub fn push(&mut self, role: Role, content: &str) {
        self.messages.push(Message::new(role, content));
        self.touch();
    }

    /// Evict all but the newest `keep_recent` messages, returning the
    /// evicted ones oldest first.
    pub fn evict(&mut self, keep_recent: usize) -> Vec<Message> {
        let cut = self.messages.len().saturating_sub(keep_recent);
        let evicted: Vec<Message> = self.messages.drain(..cut).collect();
        if !evicted.is_empty() {
            self.touch();
        }
        evicted
    }

    pub fn set_summary(&mut self, summary: &str) {
        self.summary = summary.to_string();
        self.touch();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.summary.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(n: usize) -> ConversationLog {
        let mut log = ConversationLog::default();
        for i in 0..n {
            log.push(Role::User, &format!("m{i}"));
        }
        log
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let log = log_with(5);
        let tail: Vec<String> = log.recent(2).into_iter().map(|m| m.content).collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(log.recent(50).len(), 5);
    }

    #[test]
    fn evict_keeps_newest() {
        let mut log = log_with(5);
        let evicted: Vec<String> = log.evict(2).into_iter().map(|m| m.content).collect();
        assert_eq!(evicted, vec!["m0", "m1", "m2"]);
        assert_eq!(log.messages.len(), 2);
        assert_eq!(log.messages[0].content, "m3");
        assert!(log.evict(10).is_empty());
    }
}
