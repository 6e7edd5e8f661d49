//! The agent loop.
//!
//! Each iteration streams one model response, parses tool calls out of it,
//! and either finishes (no calls) or runs every call in order, folds the
//! results into one synthetic user turn, and goes round again. The loop
//! only ever appends to the message sequence it was given.

use llmcode_config::AppConfig;
use llmcode_core::message::{Message, TOOL_RESULTS_MARKER, last_user_request};
use llmcode_core::provider::{ChatRequest, Provider, Usage};
use llmcode_core::text::{clip, truncate_with_suffix};
use llmcode_core::tool::{ToolCall, ToolOutcome, ToolRegistry, ToolResult};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::confirm::{self, ConfirmRequest, Confirmer, FixedAnswer};
use crate::interrupt::{InterruptSource, NoInterrupt};
use crate::parser::ToolCallParser;
use crate::stream_event::{AgentEvent, EventSink, NoopSink};
use crate::stream_reader::{DEFAULT_LOOKBACK, StreamOutcome, StreamReader};
use crate::supervisor::{SupervisorMode, keyword_match, requested_reason};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_RESULT_CHAR_LIMIT: usize = 3000;
const SUMMARY_CHARS: usize = 120;

/// How an `agent_chat` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStatus {
    /// The model answered without calling tools.
    Completed,
    /// The user interrupted the response.
    Stopped,
    /// A stream error or transport failure ended the call.
    Failed(String),
    /// The iteration budget ran out.
    MaxIterations,
    /// The supervisor needs answers before it can plan.
    NeedsMoreInfo,
    /// The supervisor planned and reviewed the work.
    Supervised,
}

/// Result of one `agent_chat` call.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The final answer, or the best text available.
    pub response: String,
    /// The input messages plus everything appended during the call.
    pub messages: Vec<Message>,
    pub status: ChatStatus,
    pub iterations: u32,
}

/// Transient state of one call.
#[derive(Debug, Default)]
pub(crate) struct AgentSession {
    pub(crate) iterations: u32,
    pub(crate) usage: Option<Usage>,
    /// A declined hand-off stays declined for the rest of the call.
    pub(crate) supervisor_declined: bool,
}

impl AgentSession {
    fn add_usage(&mut self, usage: Option<Usage>) {
        let Some(usage) = usage else { return };
        let total = self.usage.get_or_insert_with(Usage::default);
        total.prompt_tokens += usage.prompt_tokens;
        total.completion_tokens += usage.completion_tokens;
        total.total_tokens += usage.total_tokens;
    }
}

/// Why the supervised loop stopped.
enum LoopExit {
    Finished { response: String, status: ChatStatus },
    HandOff { reason: String },
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The inference transport
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    temperature: Option<f32>,
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Approves side effects and supervisor hand-offs
    pub(crate) confirmer: Arc<dyn Confirmer>,

    /// Receives everything the user should see
    pub(crate) sink: Arc<dyn EventSink>,

    /// Stops a streaming response early
    interrupts: Arc<dyn InterruptSource>,

    parser: ToolCallParser,
    reader: StreamReader,

    /// Maximum model calls per `agent_chat`
    max_iterations: u32,

    /// Per-result cap in the tool-results turn
    result_char_limit: usize,

    /// Cap on captured command output
    shell_output_limit: usize,
}

impl AgentLoop {
    /// Create a loop with defaults: no interrupts, no output, and every
    /// confirmation declined.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools,
            confirmer: Arc::new(FixedAnswer(false)),
            sink: Arc::new(NoopSink),
            interrupts: Arc::new(NoInterrupt),
            parser: ToolCallParser::default(),
            reader: StreamReader::new(DEFAULT_LOOKBACK),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            result_char_limit: DEFAULT_RESULT_CHAR_LIMIT,
            shell_output_limit: llmcode_tools::run_command::DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Apply model, sampling and agent limits from configuration.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.model = config.default_model.clone();
        self.temperature = config.temperature;
        self.max_tokens = config.max_tokens;
        self.max_iterations = config.agent.max_iterations;
        self.reader = StreamReader::new(config.agent.lookback_chars);
        self.result_char_limit = config.agent.result_char_limit;
        self.shell_output_limit = config.shell.output_char_limit;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_interrupts(mut self, interrupts: Arc<dyn InterruptSource>) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Set the maximum number of model calls per `agent_chat`.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Run one user turn.
    ///
    /// `messages` must already hold the system prompt and the user's
    /// request. Relative `path` arguments are resolved against `base_path`.
    /// With `supervisor` set, the turn may be handed to the supervisor.
    pub async fn agent_chat(
        &self,
        messages: Vec<Message>,
        base_path: &Path,
        supervisor: Option<SupervisorMode>,
    ) -> ChatOutcome {
        let mut messages = messages;
        let mut session = AgentSession::default();
        info!(messages = messages.len(), model = %self.model, "Agent turn started");

        let Some(mode) = &supervisor else {
            let (response, status) = self
                .run_unsupervised(&mut messages, base_path, &mut session)
                .await;
            return self.finish(response, messages, status, &session);
        };

        // A keyword in the request can suggest a hand-off before the model
        // has said anything.
        if !mode.approved {
            let keyword = last_user_request(&messages)
                .and_then(|m| keyword_match(&m.content, &mode.keywords))
                .map(str::to_string);
            if let Some(keyword) = keyword {
                let reason = format!("request mentions \"{keyword}\"");
                if self.approve_hand_off(&reason, &mut session).await {
                    return self.hand_off(messages, base_path, mode, &reason, session).await;
                }
            }
        }

        match self
            .run_supervised(&mut messages, base_path, mode, &mut session)
            .await
        {
            LoopExit::HandOff { reason } => {
                self.hand_off(messages, base_path, mode, &reason, session).await
            }
            LoopExit::Finished { response, status } => {
                self.finish(response, messages, status, &session)
            }
        }
    }

    /// Build the outcome and report completion.
    pub(crate) fn finish(
        &self,
        response: String,
        messages: Vec<Message>,
        status: ChatStatus,
        session: &AgentSession,
    ) -> ChatOutcome {
        info!(iterations = session.iterations, ?status, "Agent turn finished");
        self.sink.emit(AgentEvent::Done {
            iterations: session.iterations,
            usage: session.usage.clone(),
        });
        ChatOutcome {
            response,
            messages,
            status,
            iterations: session.iterations,
        }
    }

    /// Ask whether to hand off. A refusal is remembered for the rest of
    /// the call.
    async fn approve_hand_off(&self, reason: &str, session: &mut AgentSession) -> bool {
        if session.supervisor_declined {
            return false;
        }
        if self.confirmer.confirm(ConfirmRequest::Supervisor { reason }).await {
            return true;
        }
        session.supervisor_declined = true;
        self.sink.emit(AgentEvent::notice("Continuing without the supervisor"));
        false
    }

    /// The iteration loop with supervisor mode off. Returns on a final
    /// answer, a stop, an error, or the iteration cap.
    pub(crate) async fn run_unsupervised(
        &self,
        messages: &mut Vec<Message>,
        base_path: &Path,
        session: &mut AgentSession,
    ) -> (String, ChatStatus) {
        let budget_end = session.iterations + self.max_iterations;
        let mut last_text = String::new();

        while session.iterations < budget_end {
            let text = match self.next_response(messages, session).await {
                Ok(text) => text,
                Err(finished) => return finished,
            };

            let calls = self.parser.parse(&text);
            if calls.is_empty() {
                return (text, ChatStatus::Completed);
            }
            self.run_calls(messages, &text, calls, base_path, false).await;
            last_text = text;
        }

        self.out_of_iterations(session, last_text)
    }

    /// The iteration loop with supervisor mode armed. Also returns when the
    /// model asks for the supervisor and the user agrees.
    async fn run_supervised(
        &self,
        messages: &mut Vec<Message>,
        base_path: &Path,
        mode: &SupervisorMode,
        session: &mut AgentSession,
    ) -> LoopExit {
        let budget_end = session.iterations + self.max_iterations;
        let mut last_text = String::new();

        while session.iterations < budget_end {
            let text = match self.next_response(messages, session).await {
                Ok(text) => text,
                Err((response, status)) => return LoopExit::Finished { response, status },
            };

            if !mode.approved
                && let Some(reason) = requested_reason(&text)
                && self.approve_hand_off(&reason, session).await
            {
                return LoopExit::HandOff { reason };
            }

            let calls = self.parser.parse(&text);
            if calls.is_empty() {
                return LoopExit::Finished {
                    response: text,
                    status: ChatStatus::Completed,
                };
            }
            self.run_calls(messages, &text, calls, base_path, true).await;
            last_text = text;
        }

        let (response, status) = self.out_of_iterations(session, last_text);
        LoopExit::Finished { response, status }
    }

    /// Stream the next response. `Err` carries the answer and status when
    /// the stream ended the call.
    async fn next_response(
        &self,
        messages: &[Message],
        session: &mut AgentSession,
    ) -> Result<String, (String, ChatStatus)> {
        session.iterations += 1;
        debug!(iteration = session.iterations, "Agent loop iteration");

        match self.stream_once(messages).await {
            StreamOutcome::Completed { text, usage } => {
                session.add_usage(usage);
                Ok(text)
            }
            StreamOutcome::Cancelled { text } => {
                self.sink.emit(AgentEvent::Stopped);
                Err((text, ChatStatus::Stopped))
            }
            StreamOutcome::Failed { text, message } => {
                warn!(%message, "Model call failed");
                self.sink.emit(AgentEvent::error(message.clone()));
                Err((text, ChatStatus::Failed(message)))
            }
        }
    }

    /// Record the assistant turn, run its calls in order, and append the
    /// results turn.
    async fn run_calls(
        &self,
        messages: &mut Vec<Message>,
        text: &str,
        calls: Vec<ToolCall>,
        base_path: &Path,
        supervisor_armed: bool,
    ) {
        messages.push(Message::assistant(text));

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_call(call, base_path, supervisor_armed).await);
        }
        messages.push(Message::user(format_tool_results(
            &results,
            self.result_char_limit,
        )));
    }

    fn out_of_iterations(&self, session: &AgentSession, last_text: String) -> (String, ChatStatus) {
        warn!(iterations = session.iterations, "Max iterations reached");
        self.sink.emit(AgentEvent::MaxIterations {
            iterations: session.iterations,
        });
        (last_text, ChatStatus::MaxIterations)
    }

    /// Stream one response for the current messages, racing it against
    /// the interrupt source.
    async fn stream_once(&self, messages: &[Message]) -> StreamOutcome {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let cancel = CancellationToken::new();
        let call = async {
            let events = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return StreamOutcome::Cancelled { text: String::new() };
                }
                events = self.provider.chat_stream(request) => events,
            };
            match events {
                Ok(events) => self.reader.read(events, &cancel, self.sink.as_ref()).await,
                Err(e) => StreamOutcome::Failed {
                    text: String::new(),
                    message: e.to_string(),
                },
            }
        };
        tokio::pin!(call);

        tokio::select! {
            outcome = &mut call => outcome,
            () = self.interrupts.interrupted() => {
                cancel.cancel();
                call.await
            }
        }
    }

    /// Resolve, execute and (if needed) confirm one call.
    async fn execute_call(
        &self,
        mut call: ToolCall,
        base_path: &Path,
        supervisor_armed: bool,
    ) -> ToolResult {
        self.sink.emit(AgentEvent::ToolCall {
            name: call.tool.clone(),
            args: Value::Object(call.args.clone()),
        });

        resolve_path(&mut call, base_path);

        let outcome = if call.tool == "ask_supervisor" && !supervisor_armed {
            ToolOutcome::error("Supervisor mode is not enabled")
        } else {
            let outcome = self.tools.execute(&call).await;
            confirm::resolve(
                outcome,
                self.confirmer.as_ref(),
                self.sink.as_ref(),
                self.shell_output_limit,
            )
            .await
        };

        debug!(tool = %call.tool, success = outcome_succeeded(&outcome), "Tool finished");
        self.sink.emit(AgentEvent::ToolResult {
            name: call.tool.clone(),
            success: outcome_succeeded(&outcome),
            summary: summarize(&outcome),
        });
        ToolResult::new(call.tool, outcome)
    }
}

/// Join a relative `path` argument onto `base_path`.
fn resolve_path(call: &mut ToolCall, base_path: &Path) {
    if let Some(Value::String(path)) = call.args.get_mut("path")
        && !Path::new(path.as_str()).is_absolute()
    {
        *path = base_path.join(path.as_str()).to_string_lossy().into_owned();
    }
}

fn outcome_succeeded(outcome: &ToolOutcome) -> bool {
    match outcome {
        ToolOutcome::Ok(payload) => payload.get("success").and_then(Value::as_bool) != Some(false),
        _ => false,
    }
}

fn summarize(outcome: &ToolOutcome) -> String {
    match outcome {
        ToolOutcome::Ok(payload) => clip(&payload.to_string(), SUMMARY_CHARS).to_string(),
        ToolOutcome::Error(message) | ToolOutcome::Cancelled(message) => message.clone(),
        ToolOutcome::NeedsConfirmation(proposal) => format!("{} awaiting confirmation", proposal.action()),
    }
}

/// Render one iteration's results as the synthetic user turn.
pub fn format_tool_results(results: &[ToolResult], char_limit: usize) -> String {
    let mut text = format!("{TOOL_RESULTS_MARKER}\n");
    for result in results {
        let value = result.outcome.to_json();
        let json = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        text.push_str(&format!(
            "\n### {}\n```json\n{}\n```\n",
            result.tool,
            truncate_with_suffix(&json, char_limit)
        ));
    }
    text
}
