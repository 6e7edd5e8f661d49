//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use llmcode_core::error::ProviderError;
use llmcode_core::provider::{ChatRequest, EventStream, Provider, StreamEvent, Usage};
use llmcode_core::supervisor::{Supervisor, supervisor_error};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::confirm::{ConfirmRequest, Confirmer};
use crate::interrupt::InterruptSource;
use crate::stream_event::{AgentEvent, EventSink};

/// Tokens are sent in pieces this many characters long.
const CHUNK_CHARS: usize = 7;

/// How a scripted response ends after its text.
#[derive(Clone)]
enum Ending {
    Done,
    Error(String),
    Hang,
}

/// A provider that streams one scripted response per call.
///
/// Running out of responses is reported as a provider error.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<(String, Ending)>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self::from_script(responses.into_iter().map(|r| (r.to_string(), Ending::Done)))
    }

    /// One response that streams `text` and then an error event.
    pub fn failing_after(text: &str, message: &str) -> Self {
        Self::from_script([(text.to_string(), Ending::Error(message.to_string()))])
    }

    /// One response that streams `text` and then never finishes.
    pub fn hanging_after(text: &str) -> Self {
        Self::from_script([(text.to_string(), Ending::Hang)])
    }

    fn from_script(script: impl IntoIterator<Item = (String, Ending)>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let Some((text, ending)) = self.script.lock().unwrap().pop_front() else {
            return Err(ProviderError::InvalidResponse(
                "no more scripted responses".into(),
            ));
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let _ = tx.send(Ok(StreamEvent::Start { request_id: None })).await;
            let chars: Vec<char> = text.chars().collect();
            for chunk in chars.chunks(CHUNK_CHARS) {
                let piece: String = chunk.iter().collect();
                if tx.send(Ok(StreamEvent::token(piece))).await.is_err() {
                    return;
                }
            }
            match ending {
                Ending::Done => {
                    let usage = Usage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    };
                    let _ = tx.send(Ok(StreamEvent::Done { usage: Some(usage) })).await;
                }
                Ending::Error(message) => {
                    let _ = tx.send(Ok(StreamEvent::error(message))).await;
                }
                Ending::Hang => tx.closed().await,
            }
        });
        Ok(rx)
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn visible_text(&self) -> String {
        self.collect(|e| match e {
            AgentEvent::Text { content } => Some(content),
            _ => None,
        })
    }

    pub fn thinking_text(&self) -> String {
        self.collect(|e| match e {
            AgentEvent::Thinking { content } => Some(content),
            _ => None,
        })
    }

    fn collect(&self, pick: impl Fn(&AgentEvent) -> Option<&String>) -> String {
        let events = self.events.lock().unwrap();
        events.iter().filter_map(pick).map(String::as_str).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AgentEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Answers confirmations from a script; an exhausted script says no.
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// The kinds of request asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, request: ConfirmRequest<'_>) -> bool {
        let kind = match request {
            ConfirmRequest::WriteFile { .. } => "write_file",
            ConfirmRequest::RunCommand { .. } => "run_command",
            ConfirmRequest::Supervisor { .. } => "supervisor",
        };
        self.asked.lock().unwrap().push(kind.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// Replies from a script and records every prompt.
pub struct ScriptedSupervisor {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedSupervisor {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Supervisor for ScriptedSupervisor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, prompt: &str, _system: Option<&str>) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| supervisor_error("no more scripted replies"))
    }
}

/// Fires once after a delay.
pub struct SleepThenInterrupt(Duration);

impl SleepThenInterrupt {
    pub fn millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

#[async_trait]
impl InterruptSource for SleepThenInterrupt {
    async fn interrupted(&self) {
        tokio::time::sleep(self.0).await;
    }
}

/// A model reply that calls one tool in a tagged block.
pub fn tool_call_text(tool: &str, args: Value) -> String {
    format!("<tool_call>\n{{\"tool\": \"{tool}\", \"args\": {args}}}\n</tool_call>")
}
