//! Supervisor hand-off.
//!
//! A stronger model plans, the local loop executes with the full tool set,
//! and the supervisor reviews. At most one continuation round follows a
//! review; nested runs never hand off again.

mod handoff;
pub mod protocol;

use llmcode_core::supervisor::Supervisor;
use std::sync::Arc;

pub use handoff::{
    context_digest, continuation_prompt, execution_prompt, final_answer, keyword_match,
    questions_answer, requested_reason,
};
pub use protocol::{Plan, Review, ReviewStatus};

/// Supervisor settings for one `agent_chat` call.
#[derive(Clone)]
pub struct SupervisorMode {
    pub supervisor: Arc<dyn Supervisor>,

    /// Words in the user's request that suggest a hand-off.
    pub keywords: Vec<String>,

    /// The user already settled the hand-off question for this turn.
    /// Keyword and marker detection are skipped; `ask_supervisor` still works.
    pub approved: bool,
}

impl SupervisorMode {
    pub fn new(supervisor: Arc<dyn Supervisor>, keywords: Vec<String>) -> Self {
        Self {
            supervisor,
            keywords,
            approved: false,
        }
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
}

impl std::fmt::Debug for SupervisorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorMode")
            .field("supervisor", &self.supervisor.name())
            .field("keywords", &self.keywords)
            .field("approved", &self.approved)
            .finish()
    }
}
