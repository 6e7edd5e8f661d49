//! Supervisor backed by the remote messages API.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Answer taken from the first content block's text

use async_trait::async_trait;
use llmcode_config::SupervisorConfig;
use llmcode_core::error::ProviderError;
use llmcode_core::supervisor::{Supervisor, supervisor_error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ApiSupervisor {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserTurn<'a>; 1],
}

#[derive(Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl ApiSupervisor {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        })
    }

    pub fn from_config(config: &SupervisorConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self::new(api_key, Duration::from_secs(config.timeout_secs))?
            .with_base_url(&config.api_url)
            .with_model(&config.model)
            .with_max_tokens(config.max_tokens))
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn send(&self, prompt: &str, system: Option<&str>) -> Result<String, String> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { "Request timed out".to_string() } else { e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), text.trim()));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {e}"))?;

        parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| "Response has no text content".to_string())
    }
}

#[async_trait]
impl Supervisor for ApiSupervisor {
    fn name(&self) -> &str {
        "api"
    }

    async fn chat(&self, prompt: &str, system: Option<&str>) -> String {
        debug!(model = %self.model, chars = prompt.len(), "Calling API supervisor");
        match self.send(prompt, system).await {
            Ok(text) => text,
            Err(reason) => {
                warn!(reason = %reason, "API supervisor failed");
                supervisor_error(reason)
            }
        }
    }
}
