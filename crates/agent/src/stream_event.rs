//! Agent-level events.
//!
//! `AgentEvent` is what the loop reports while it works: streamed text,
//! tool activity, supervisor phases and terminal states. The terminal
//! front-end renders them; tests record them.

use llmcode_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the agent during one `agent_chat` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Visible model text.
    Text { content: String },

    /// Text inside a think span, rendered de-emphasised.
    Thinking { content: String },

    /// The agent is about to run a tool.
    ToolCall {
        name: String,
        args: serde_json::Value,
    },

    /// A tool finished (or was cancelled).
    ToolResult {
        name: String,
        success: bool,
        summary: String,
    },

    /// The head of a confirmed command's output.
    CommandOutput { output: String },

    /// Informational line that is not model output.
    Notice { message: String },

    /// An error, shown inline and never as model text.
    Error { message: String },

    /// The user interrupted the response.
    Stopped,

    /// The iteration budget ran out.
    MaxIterations { iterations: u32 },

    /// The supervisor is being asked for a plan.
    SupervisorPlanning { reason: String },

    /// The supervisor's plan.
    SupervisorPlan { plan: String, steps: Vec<String> },

    /// The local model is executing the plan (or its continuation).
    LocalExecuting { continuation: bool },

    /// The supervisor is reviewing the result.
    SupervisorReviewing,

    /// The supervisor's verdict.
    SupervisorReview { status: String, feedback: String },

    /// The call finished.
    Done {
        iterations: u32,
        usage: Option<Usage>,
    },
}

impl AgentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::CommandOutput { .. } => "command_output",
            Self::Notice { .. } => "notice",
            Self::Error { .. } => "error",
            Self::Stopped => "stopped",
            Self::MaxIterations { .. } => "max_iterations",
            Self::SupervisorPlanning { .. } => "supervisor_planning",
            Self::SupervisorPlan { .. } => "supervisor_plan",
            Self::LocalExecuting { .. } => "local_executing",
            Self::SupervisorReviewing => "supervisor_reviewing",
            Self::SupervisorReview { .. } => "supervisor_review",
            Self::Done { .. } => "done",
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Where the loop sends its events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Discards every event.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: AgentEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_uses_snake_case_tags() {
        let json = serde_json::to_string(&AgentEvent::Text {
            content: "Hello".into(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"text""#));
        assert!(json.contains(r#""content":"Hello""#));

        let json = serde_json::to_string(&AgentEvent::MaxIterations { iterations: 10 }).unwrap();
        assert_eq!(json, r#"{"type":"max_iterations","iterations":10}"#);
    }

    #[test]
    fn unit_variants_roundtrip() {
        let event: AgentEvent = serde_json::from_str(r#"{"type":"stopped"}"#).unwrap();
        assert_eq!(event, AgentEvent::Stopped);
        assert_eq!(event.event_type(), "stopped");
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AgentEvent::notice("x").event_type(), "notice");
        assert_eq!(AgentEvent::error("x").event_type(), "error");
        assert_eq!(
            AgentEvent::ToolResult {
                name: "read_file".into(),
                success: true,
                summary: String::new(),
            }
            .event_type(),
            "tool_result"
        );
        assert_eq!(
            AgentEvent::SupervisorReview {
                status: "completed".into(),
                feedback: String::new(),
            }
            .event_type(),
            "supervisor_review"
        );
    }
}
