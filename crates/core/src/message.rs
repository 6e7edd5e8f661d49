//! Message domain types.
//!
//! A conversation is an ordered `Vec<Message>`. The first message, when
//! present, is the system prompt. Tool results travel back to the model as
//! user-role turns that start with [`TOOL_RESULTS_MARKER`], which lets the
//! loop tell them apart from what the human actually typed.

use serde::{Deserialize, Serialize};

/// Prefix of every synthetic user turn that carries tool results.
pub const TOOL_RESULTS_MARKER: &str = "Tool results:";

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (tool catalogue, rules, context)
    System,
    /// The human, or a synthetic tool-results turn
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Whether this is a synthetic tool-results turn rather than human input.
    pub fn is_tool_results(&self) -> bool {
        self.role == Role::User && self.content.starts_with(TOOL_RESULTS_MARKER)
    }
}

/// Find the most recent message the human actually typed.
pub fn last_user_request(messages: &[Message]) -> Option<&Message> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !m.is_tool_results())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello!");
        assert!(!msg.is_tool_results());
    }

    #[test]
    fn tool_results_are_recognised() {
        let msg = Message::user(format!("{TOOL_RESULTS_MARKER}\n\n### read_file"));
        assert!(msg.is_tool_results());
        // Only user-role turns count
        let echoed = Message::assistant(format!("{TOOL_RESULTS_MARKER} quoted"));
        assert!(!echoed.is_tool_results());
    }

    #[test]
    fn last_user_request_skips_tool_results() {
        let messages = vec![
            Message::system("sys"),
            Message::user("fix the bug"),
            Message::assistant("reading"),
            Message::user(format!("{TOOL_RESULTS_MARKER}\n...")),
        ];
        let found = last_user_request(&messages).unwrap();
        assert_eq!(found.content, "fix the bug");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
