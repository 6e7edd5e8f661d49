use llmcode_core::message::{Message, Role, last_user_request};
use llmcode_core::text::clip;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

use super::SupervisorMode;
use super::protocol::{Plan, Review, ReviewStatus, request_plan, request_review};
use crate::loop_runner::{AgentLoop, AgentSession, ChatOutcome, ChatStatus};
use crate::stream_event::AgentEvent;

static REQUEST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<request_supervisor>\s*reason:\s*(.+?)\s*</request_supervisor>")
        .expect("request marker regex")
});

const DIGEST_MESSAGES: usize = 6;
const DIGEST_MESSAGE_CHARS: usize = 500;

/// The reason given in a `<request_supervisor>` marker, if the model wrote one.
pub fn requested_reason(text: &str) -> Option<String> {
    REQUEST_MARKER
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|reason| !reason.is_empty())
}

/// First keyword that appears in `text`, ignoring case.
pub fn keyword_match<'k>(text: &str, keywords: &'k [String]) -> Option<&'k str> {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .find(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
}

/// The last few non-system turns, each clipped, one per line.
pub fn context_digest(messages: &[Message]) -> String {
    let start = messages.len().saturating_sub(DIGEST_MESSAGES);
    messages[start..]
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}", m.role.as_str(), clip(&m.content, DIGEST_MESSAGE_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The user turn that tells the local model to carry out a plan.
pub fn execution_prompt(plan: &Plan) -> String {
    let mut prompt = format!("The supervisor has created this plan:\n{}\n", plan.plan);
    if !plan.steps.is_empty() {
        prompt.push_str("\nSteps:\n");
        for (i, step) in plan.steps.iter().enumerate() {
            prompt.push_str(&format!("{}. {step}\n", i + 1));
        }
    }
    prompt.push_str("\nExecute these steps using available tools. After completing, summarize what was done.");
    prompt
}

pub fn continuation_prompt(next_steps: &[String]) -> String {
    let mut prompt = String::from("Continue with:");
    for step in next_steps {
        prompt.push_str("\n- ");
        prompt.push_str(step);
    }
    prompt
}

/// The answer returned when the supervisor cannot plan without more input.
pub fn questions_answer(plan: &Plan) -> String {
    let mut answer = String::from("[Supervisor] More information needed:");
    if plan.questions.is_empty() {
        answer.push('\n');
        answer.push_str(&plan.plan);
    }
    for question in &plan.questions {
        answer.push_str("\n- ");
        answer.push_str(question);
    }
    answer
}

pub fn final_answer(response: &str, feedback: &str) -> String {
    if feedback.trim().is_empty() {
        return response.to_string();
    }
    format!("{response}\n\n[Supervisor feedback: {feedback}]")
}

impl AgentLoop {
    /// Plan with the supervisor, execute locally, review, and continue at
    /// most once. Nested runs have supervisor mode off.
    pub(crate) async fn hand_off(
        &self,
        mut messages: Vec<Message>,
        base_path: &Path,
        mode: &SupervisorMode,
        reason: &str,
        mut session: AgentSession,
    ) -> ChatOutcome {
        info!(supervisor = mode.supervisor.name(), %reason, "Handing off to supervisor");
        self.sink.emit(AgentEvent::SupervisorPlanning {
            reason: reason.to_string(),
        });

        let request = last_user_request(&messages)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let digest = context_digest(&messages);

        let plan = match request_plan(mode.supervisor.as_ref(), &request, &digest).await {
            Ok(plan) => plan,
            Err(error) => {
                warn!(%error, "Supervisor planning failed; continuing locally");
                self.sink.emit(AgentEvent::error(error));
                self.sink.emit(AgentEvent::notice("Continuing without the supervisor"));
                let (response, status) = self
                    .run_unsupervised(&mut messages, base_path, &mut session)
                    .await;
                return self.finish(response, messages, status, &session);
            }
        };

        if plan.needs_more_info {
            let answer = questions_answer(&plan);
            self.sink.emit(AgentEvent::Text {
                content: answer.clone(),
            });
            return self.finish(answer, messages, ChatStatus::NeedsMoreInfo, &session);
        }

        self.sink.emit(AgentEvent::SupervisorPlan {
            plan: plan.plan.clone(),
            steps: plan.steps.clone(),
        });
        messages.push(Message::user(execution_prompt(&plan)));
        self.sink.emit(AgentEvent::LocalExecuting { continuation: false });

        let (mut response, status) = self
            .run_unsupervised(&mut messages, base_path, &mut session)
            .await;
        if matches!(status, ChatStatus::Stopped | ChatStatus::Failed(_)) {
            return self.finish(response, messages, status, &session);
        }

        self.sink.emit(AgentEvent::SupervisorReviewing);
        let (review, mut status) = match request_review(mode.supervisor.as_ref(), &request, &response).await {
            Ok(review) => (review, ChatStatus::Supervised),
            Err(error) => {
                warn!(%error, "Supervisor review failed");
                let review = Review {
                    status: ReviewStatus::Failed,
                    feedback: error.clone(),
                    next_steps: Vec::new(),
                };
                (review, ChatStatus::Failed(error))
            }
        };
        self.sink.emit(AgentEvent::SupervisorReview {
            status: review.status.as_str().to_string(),
            feedback: review.feedback.clone(),
        });

        if review.status == ReviewStatus::Continue && !review.next_steps.is_empty() {
            messages.push(Message::assistant(response.clone()));
            messages.push(Message::user(continuation_prompt(&review.next_steps)));
            self.sink.emit(AgentEvent::LocalExecuting { continuation: true });

            let (continued, continued_status) = self
                .run_unsupervised(&mut messages, base_path, &mut session)
                .await;
            response = continued;
            if matches!(continued_status, ChatStatus::Stopped | ChatStatus::Failed(_)) {
                status = continued_status;
            }
        }

        let answer = final_answer(&response, &review.feedback);
        self.finish(answer, messages, status, &session)
    }
}
