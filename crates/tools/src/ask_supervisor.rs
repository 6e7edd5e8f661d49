//! Ask supervisor tool: forwards one question to the supervisor model.

use async_trait::async_trait;
use llmcode_core::error::ToolError;
use llmcode_core::supervisor::{Supervisor, is_supervisor_error};
use llmcode_core::tool::{Tool, ToolOutcome};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::args::required_str;

const NAME: &str = "ask_supervisor";

const SYSTEM: &str = "You are a senior engineer advising a smaller coding model. \
Answer its question directly and concisely.";

pub struct AskSupervisorTool {
    supervisor: Arc<dyn Supervisor>,
}

impl AskSupervisorTool {
    pub fn new(supervisor: Arc<dyn Supervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl Tool for AskSupervisorTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Ask the supervisor model for advice on a hard problem"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "The question to ask" }
            },
            "required": ["question"]
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![json!({ "question": "How should I structure the retry logic?" })]
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let question = required_str(&arguments, "question")?;
        info!(supervisor = self.supervisor.name(), "Asking supervisor");

        let answer = self.supervisor.chat(question, Some(SYSTEM)).await;
        if is_supervisor_error(&answer) {
            return Err(ToolError::failed(NAME, answer));
        }
        Ok(ToolOutcome::Ok(json!({ "answer": answer })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmcode_core::supervisor::supervisor_error;

    struct Canned(String);

    #[async_trait]
    impl Supervisor for Canned {
        fn name(&self) -> &str {
            "canned"
        }
        async fn chat(&self, prompt: &str, system: Option<&str>) -> String {
            assert!(system.is_some());
            format!("{}: {prompt}", self.0)
        }
    }

    #[tokio::test]
    async fn returns_answer() {
        let tool = AskSupervisorTool::new(Arc::new(Canned("advice".into())));
        let out = tool.execute(json!({"question": "why?"})).await.unwrap();
        assert_eq!(out.to_json(), json!({"answer": "advice: why?"}));
    }

    #[tokio::test]
    async fn error_marker_becomes_error() {
        let tool = AskSupervisorTool::new(Arc::new(Canned(supervisor_error("offline"))));
        let err = tool.execute(json!({"question": "why?"})).await.unwrap_err();
        assert!(err.to_string().starts_with("[Supervisor Error] offline"));
    }
}
