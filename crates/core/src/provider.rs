//! Provider trait: the abstraction over the inference transport.
//!
//! A provider takes the full message sequence plus a model name and yields
//! an ordered stream of [`StreamEvent`]s: zero or more `token`s followed by
//! exactly one terminal `done` or `error`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// One chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g. "llama3.2:3b")
    pub model: String,

    /// The conversation messages, system prompt first
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A single typed event on the inference stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The server accepted the request.
    Start {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// A fragment of generated text.
    Token { content: String },

    /// Generation finished.
    Done {
        #[serde(default)]
        usage: Option<Usage>,
    },

    /// Generation failed.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl StreamEvent {
    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// The receiving half of an inference stream.
pub type EventStream = mpsc::Receiver<std::result::Result<StreamEvent, ProviderError>>;

/// Server status as reported by the health endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerHealth {
    #[serde(default)]
    pub status: String,

    /// Everything else the server chose to report.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ServerHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

/// A model offered by the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,

    /// "chat" or "embedding"
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub size_gb: Option<f64>,
}

/// The core Provider trait.
///
/// The agent loop only ever streams; it never needs a blocking completion.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get a stream of events back.
    async fn chat_stream(&self, request: ChatRequest) -> std::result::Result<EventStream, ProviderError>;

    /// List models the server can serve.
    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check: can we reach the server?
    async fn health_check(&self) -> std::result::Result<ServerHealth, ProviderError> {
        Ok(ServerHealth {
            status: "ok".into(),
            details: serde_json::Map::new(),
        })
    }
}
