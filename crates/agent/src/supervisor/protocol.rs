//! Plan/review exchange with the supervisor model.
//!
//! The supervisor answers in prose that usually contains JSON. Parsing is
//! best effort: a reply that does not decode degrades to a value carrying
//! the raw text, never to an error.

use llmcode_core::supervisor::{Supervisor, is_supervisor_error};
use llmcode_core::text::truncate_with_suffix;
use serde::Deserialize;
use tracing::debug;

/// Context and execution results are cut to this before sending.
pub const MAX_SUPERVISOR_INPUT: usize = 4000;

const PLAN_SYSTEM: &str = r#"You are a code assistant supervisor. Create a clear execution plan.

Respond in JSON format:
{
    "plan": "Brief description of the approach",
    "steps": ["Step 1: ...", "Step 2: ...", ...],
    "needs_more_info": false,
    "questions": []
}

If you need more information before planning, set needs_more_info to true and list questions.

Keep plans concise and actionable. Focus on what needs to be done, not how (the executor will handle details).
Respond in the same language as the user request."#;

const REVIEW_SYSTEM: &str = r#"You are reviewing the execution result of a task.

Respond in JSON format:
{
    "status": "completed" | "continue" | "failed",
    "feedback": "Brief feedback on the result",
    "next_steps": ["Next step 1", ...]
}

- "completed": Task is done successfully
- "continue": More work needed, provide next_steps
- "failed": Task failed, explain in feedback

Be concise. Respond in the same language as the original request."#;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub needs_more_info: bool,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Completed,
    Continue,
    Failed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Continue => "continue",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// The JSON-looking part of a reply: a ```json block, else any fenced
/// block, else the whole text.
fn extract_json(reply: &str) -> &str {
    let fenced = |opener: &str| {
        let start = reply.find(opener)? + opener.len();
        let body = &reply[start..];
        Some(body.find("```").map_or(body, |end| &body[..end]))
    };
    fenced("```json")
        .or_else(|| fenced("```"))
        .unwrap_or(reply)
        .trim()
}

pub fn parse_plan(reply: &str) -> Plan {
    serde_json::from_str(extract_json(reply)).unwrap_or_else(|e| {
        debug!(error = %e, "Supervisor plan is not JSON; using the raw text");
        Plan {
            plan: reply.to_string(),
            ..Plan::default()
        }
    })
}

pub fn parse_review(reply: &str) -> Review {
    serde_json::from_str(extract_json(reply)).unwrap_or_else(|e| {
        debug!(error = %e, "Supervisor review is not JSON; using the raw text");
        Review {
            feedback: reply.to_string(),
            ..Review::default()
        }
    })
}

/// Ask for a plan. `Err` carries the backend's error string.
pub async fn request_plan(
    supervisor: &dyn Supervisor,
    request: &str,
    context: &str,
) -> Result<Plan, String> {
    let mut prompt = format!("User request: {request}");
    if !context.is_empty() {
        prompt.push_str("\n\nContext:\n");
        prompt.push_str(&truncate_with_suffix(context, MAX_SUPERVISOR_INPUT));
    }

    let reply = supervisor.chat(&prompt, Some(PLAN_SYSTEM)).await;
    if is_supervisor_error(&reply) {
        return Err(reply);
    }
    Ok(parse_plan(&reply))
}

/// Ask for a review of `result`. `Err` carries the backend's error string.
pub async fn request_review(
    supervisor: &dyn Supervisor,
    request: &str,
    result: &str,
) -> Result<Review, String> {
    let prompt = format!(
        "Original request: {request}\n\nExecution result:\n{}",
        truncate_with_suffix(result, MAX_SUPERVISOR_INPUT)
    );

    let reply = supervisor.chat(&prompt, Some(REVIEW_SYSTEM)).await;
    if is_supervisor_error(&reply) {
        return Err(reply);
    }
    Ok(parse_review(&reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_from_json_fence() {
        let reply = "Sure.\n```json\n{\"plan\": \"Fix it\", \"steps\": [\"read\", \"edit\"]}\n```\nGood luck";
        let plan = parse_plan(reply);
        assert_eq!(plan.plan, "Fix it");
        assert_eq!(plan.steps, vec!["read", "edit"]);
        assert!(!plan.needs_more_info);
    }

    #[test]
    fn plan_from_plain_fence_and_raw() {
        let fenced = "```\n{\"plan\": \"A\", \"needs_more_info\": true, \"questions\": [\"Which file?\"]}\n```";
        let plan = parse_plan(fenced);
        assert!(plan.needs_more_info);
        assert_eq!(plan.questions, vec!["Which file?"]);

        let raw = parse_plan("  {\"plan\": \"B\"}  ");
        assert_eq!(raw.plan, "B");
    }

    #[test]
    fn unparseable_plan_keeps_raw_text() {
        let reply = "I would start by reading main.rs, then refactor.";
        assert_eq!(
            parse_plan(reply),
            Plan {
                plan: reply.into(),
                steps: vec![],
                needs_more_info: false,
                questions: vec![]
            }
        );
    }

    #[test]
    fn review_statuses() {
        let review = parse_review(r#"{"status": "continue", "feedback": "half way", "next_steps": ["add tests"]}"#);
        assert_eq!(review.status, ReviewStatus::Continue);
        assert_eq!(review.next_steps, vec!["add tests"]);

        let review = parse_review(r#"{"status": "failed", "feedback": "nope"}"#);
        assert_eq!(review.status, ReviewStatus::Failed);
        assert!(review.next_steps.is_empty());
    }

    #[test]
    fn unparseable_review_is_completed_with_raw_feedback() {
        let review = parse_review("Looks great to me!");
        assert_eq!(review.status, ReviewStatus::Completed);
        assert_eq!(review.feedback, "Looks great to me!");
        assert!(review.next_steps.is_empty());
    }

    #[test]
    fn unterminated_fence_uses_rest_of_text() {
        let plan = parse_plan("```json\n{\"plan\": \"C\", \"steps\": []}");
        assert_eq!(plan.plan, "C");
    }
}
