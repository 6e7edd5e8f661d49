//! End-to-end tests for llmcode.
//!
//! These drive the real inference-server client against a mock HTTP server
//! and run the full agent pipeline: streaming, tool-call parsing, tool
//! execution, the confirmation gate and supervisor hand-off.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use llmcode_agent::{
    AgentEvent, AgentLoop, ChatStatus, ConfirmRequest, Confirmer, EventSink, SupervisorMode,
};
use llmcode_config::NetworkConfig;
use llmcode_core::error::ProviderError;
use llmcode_core::message::{Message, Role};
use llmcode_core::provider::{ChatRequest, EventStream, Provider};
use llmcode_providers::{ApiSupervisor, InferenceServerClient};
use llmcode_tools::{RegistryOptions, default_registry};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Mock inference server ───────────────────────────────────────────────

/// An SSE body streaming `text` in small token events, then `done`.
fn sse_body(text: &str) -> String {
    let mut body = String::from("data: {\"type\":\"start\",\"request_id\":\"e2e\"}\n\n");
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(5) {
        let piece: String = chunk.iter().collect();
        body.push_str(&format!("data: {}\n\n", json!({"type": "token", "content": piece})));
    }
    body.push_str(
        "data: {\"type\":\"done\",\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":6,\"total_tokens\":18}}\n\n",
    );
    body
}

/// Mount one response per entry, served in order.
async fn script_server(server: &MockServer, responses: &[String]) {
    for text in responses {
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(text), "text/event-stream"))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

fn client(server: &MockServer) -> InferenceServerClient {
    let network = NetworkConfig {
        connect_timeout_secs: 2,
        read_timeout_secs: 10,
        max_retries: 0,
        retry_backoff_ms: 1,
    };
    InferenceServerClient::new(server.uri(), None, &network).unwrap()
}

fn call(tool: &str, args: serde_json::Value) -> String {
    format!("<tool_call>\n{}\n</tool_call>", json!({"tool": tool, "args": args}))
}

fn conversation(user: &str) -> Vec<Message> {
    vec![Message::system("You are a coding assistant."), Message::user(user)]
}

// ── Test collaborators ──────────────────────────────────────────────────

/// Counts model calls so tests can check what happened before the first one.
struct CountingProvider {
    inner: InferenceServerClient,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.chat_stream(request).await
    }
}

/// Answers from a script and notes how many model calls preceded each ask.
struct RecordingConfirmer {
    answers: Mutex<Vec<bool>>,
    asked: Mutex<Vec<(String, usize)>>,
    model_calls: Arc<AtomicUsize>,
}

impl RecordingConfirmer {
    fn new(answers: Vec<bool>, model_calls: Arc<AtomicUsize>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().rev().collect()),
            asked: Mutex::new(Vec::new()),
            model_calls,
        }
    }

    fn asked(&self) -> Vec<(String, usize)> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for RecordingConfirmer {
    async fn confirm(&self, request: ConfirmRequest<'_>) -> bool {
        let kind = match request {
            ConfirmRequest::WriteFile { .. } => "write_file",
            ConfirmRequest::RunCommand { .. } => "run_command",
            ConfirmRequest::Supervisor { .. } => "supervisor",
        };
        let calls = self.model_calls.load(Ordering::SeqCst);
        self.asked.lock().unwrap().push((kind.to_string(), calls));
        self.answers.lock().unwrap().pop().unwrap_or(false)
    }
}

#[derive(Default)]
struct CollectingSink(Mutex<Vec<AgentEvent>>);

impl CollectingSink {
    fn events(&self) -> Vec<AgentEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: AgentEvent) {
        self.0.lock().unwrap().push(event);
    }
}

struct Harness {
    agent: AgentLoop,
    confirmer: Arc<RecordingConfirmer>,
    sink: Arc<CollectingSink>,
    model_calls: Arc<AtomicUsize>,
}

fn harness(server: &MockServer, answers: Vec<bool>) -> Harness {
    let model_calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(CountingProvider {
        inner: client(server),
        calls: model_calls.clone(),
    });
    let confirmer = Arc::new(RecordingConfirmer::new(answers, model_calls.clone()));
    let sink = Arc::new(CollectingSink::default());
    let tools = Arc::new(default_registry(RegistryOptions::default()));
    let agent = AgentLoop::new(provider, "llama3.2:3b", tools)
        .with_confirmer(confirmer.clone())
        .with_sink(sink.clone());
    Harness {
        agent,
        confirmer,
        sink,
        model_calls,
    }
}

fn last_results(messages: &[Message]) -> serde_json::Value {
    let text = &messages.last().unwrap().content;
    let start = text.find("```json\n").unwrap() + "```json\n".len();
    let end = text[start..].find("\n```").unwrap() + start;
    serde_json::from_str(&text[start..end]).unwrap()
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plain_answer_ends_on_first_iteration() {
    let server = MockServer::start().await;
    script_server(&server, &["<think>simple question</think>Rust is a systems language.".into()]).await;
    let h = harness(&server, vec![]);

    let input = conversation("what is rust?");
    let outcome = h.agent.agent_chat(input.clone(), Path::new("."), None).await;

    assert_eq!(outcome.status, ChatStatus::Completed);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.response, "<think>simple question</think>Rust is a systems language.");
    assert_eq!(outcome.messages, input);

    let visible: String = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::Text { content } => Some(content),
            _ => None,
        })
        .collect();
    assert_eq!(visible, "Rust is a systems language.");
    assert!(h.sink.events().iter().any(
        |e| matches!(e, AgentEvent::Done { usage: Some(u), .. } if u.total_tokens == 18)
    ));
}

#[tokio::test]
async fn e2e_missing_file_error_feeds_back() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    script_server(
        &server,
        &[
            call("read_file", json!({"path": "x.py"})),
            "x.py does not exist.".into(),
        ],
    )
    .await;
    let h = harness(&server, vec![]);

    let input = conversation("show me x.py");
    let outcome = h.agent.agent_chat(input.clone(), dir.path(), None).await;

    assert_eq!(outcome.status, ChatStatus::Completed);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.messages.len(), input.len() + 2);
    assert_eq!(outcome.messages[2].role, Role::Assistant);
    assert_eq!(outcome.messages[3].role, Role::User);

    let results = last_results(&outcome.messages);
    let error = results["error"].as_str().unwrap();
    assert!(error.starts_with("File not found:"), "{error}");
    assert!(error.ends_with("x.py"), "{error}");

    // The second request carried the tool results
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    assert_eq!(body["options"]["model"], "llama3.2:3b");
}

#[tokio::test]
async fn e2e_declined_write_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    script_server(
        &server,
        &[
            call("write_file", json!({"path": "a.txt", "content": "hi"})),
            "Okay, I won't write it.".into(),
        ],
    )
    .await;
    let h = harness(&server, vec![false]);

    let outcome = h.agent.agent_chat(conversation("create a.txt"), dir.path(), None).await;

    assert!(!dir.path().join("a.txt").exists());
    assert_eq!(last_results(&outcome.messages), json!({"cancelled": true, "message": "User cancelled"}));
    assert_eq!(h.confirmer.asked(), vec![("write_file".to_string(), 1)]);
    assert_eq!(outcome.response, "Okay, I won't write it.");
}

#[tokio::test]
async fn e2e_approved_write_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "old\n").unwrap();
    let server = MockServer::start().await;
    script_server(
        &server,
        &[
            call("write_file", json!({"path": "a.txt", "content": "new\n"})),
            "Updated a.txt.".into(),
        ],
    )
    .await;
    let h = harness(&server, vec![true]);

    let outcome = h.agent.agent_chat(conversation("update a.txt"), dir.path(), None).await;

    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new\n");
    let results = last_results(&outcome.messages);
    assert_eq!(results["success"], true);
    assert_eq!(results["message"], "File updated");
}

#[tokio::test]
async fn e2e_max_iterations_preserves_last_text() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let responses: Vec<String> = (1..=12)
        .map(|i| format!("Looking again ({i}).\n{}", call("list_files", json!({"path": "."}))))
        .collect();
    script_server(&server, &responses).await;
    let h = harness(&server, vec![]);

    let input = conversation("keep looking");
    let outcome = h.agent.agent_chat(input.clone(), dir.path(), None).await;

    assert_eq!(outcome.status, ChatStatus::MaxIterations);
    assert_eq!(outcome.iterations, 10);
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 10);
    assert!(outcome.response.starts_with("Looking again (10)."));
    assert_eq!(outcome.messages.len(), input.len() + 20);
    assert_eq!(&outcome.messages[..input.len()], &input[..]);
    assert!(h.sink.events().contains(&AgentEvent::MaxIterations { iterations: 10 }));
}

#[tokio::test]
async fn e2e_declined_supervisor_keyword_runs_locally() {
    let server = MockServer::start().await;
    script_server(&server, &["Here is my local answer.".into()]).await;

    let supervisor_api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": [{"text": "{}"}]})))
        .expect(0)
        .mount(&supervisor_api)
        .await;
    let supervisor = ApiSupervisor::new("key", Duration::from_secs(5))
        .unwrap()
        .with_base_url(supervisor_api.uri());

    let h = harness(&server, vec![false]);
    let mode = SupervisorMode::new(Arc::new(supervisor), vec!["claude".into()]);

    let outcome = h
        .agent
        .agent_chat(conversation("can claude review this?"), Path::new("."), Some(mode))
        .await;

    // Asked before any model call, then the normal loop ran
    assert_eq!(h.confirmer.asked(), vec![("supervisor".to_string(), 0)]);
    assert_eq!(outcome.status, ChatStatus::Completed);
    assert_eq!(outcome.response, "Here is my local answer.");
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn e2e_supervisor_plans_and_reviews() {
    let server = MockServer::start().await;
    script_server(&server, &["Added the greeting.".into()]).await;

    let supervisor_api = MockServer::start().await;
    let plan = json!({"plan": "Add a greeting", "steps": ["edit main.rs"]}).to_string();
    let review = json!({"status": "completed", "feedback": "Well done"}).to_string();
    for reply in [plan, review] {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": [{"text": reply}]})))
            .up_to_n_times(1)
            .mount(&supervisor_api)
            .await;
    }
    let supervisor = ApiSupervisor::new("key", Duration::from_secs(5))
        .unwrap()
        .with_base_url(supervisor_api.uri());

    let h = harness(&server, vec![true]);
    let mode = SupervisorMode::new(Arc::new(supervisor), vec!["supervisor".into()]);

    let outcome = h
        .agent
        .agent_chat(conversation("supervisor: add a greeting"), Path::new("."), Some(mode))
        .await;

    assert_eq!(outcome.status, ChatStatus::Supervised);
    assert_eq!(outcome.response, "Added the greeting.\n\n[Supervisor feedback: Well done]");
    assert!(outcome.messages.last().unwrap().content.contains("1. edit main.rs"));
    assert_eq!(supervisor_api.received_requests().await.unwrap().len(), 2);

    let events = h.sink.events();
    assert!(events.contains(&AgentEvent::SupervisorPlan {
        plan: "Add a greeting".into(),
        steps: vec!["edit main.rs".into()]
    }));
    assert!(events.contains(&AgentEvent::SupervisorReviewing));
}

#[tokio::test]
async fn e2e_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;
    let h = harness(&server, vec![]);

    let input = conversation("hi");
    let outcome = h.agent.agent_chat(input.clone(), Path::new("."), None).await;

    assert!(matches!(&outcome.status, ChatStatus::Failed(message) if message.contains("model crashed")));
    assert_eq!(outcome.messages, input);
    assert!(h.sink.events().iter().any(|e| matches!(e, AgentEvent::Error { .. })));
}
