//! Client for the llmcode inference server.
//!
//! Endpoints:
//! - `POST /api/v1/chat`   - streaming chat completion (SSE)
//! - `GET  /api/v1/health` - server and backend status
//! - `GET  /api/v1/models` - models the server can run
//!
//! Connection failures and timeouts that happen before a response arrives
//! are retried with linear backoff. HTTP error statuses are not retried.

use async_trait::async_trait;
use futures::StreamExt;
use llmcode_config::{AppConfig, NetworkConfig};
use llmcode_core::error::ProviderError;
use llmcode_core::message::Message;
use llmcode_core::provider::{ChatRequest, EventStream, ModelInfo, Provider, ServerHealth};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::sse::SseDecoder;

/// How transport failures are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(network: &NetworkConfig) -> Self {
        Self {
            max_retries: network.max_retries,
            backoff: Duration::from_millis(network.retry_backoff_ms),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Streaming client for the inference server.
pub struct InferenceServerClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl InferenceServerClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        network: &NetworkConfig,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
            .read_timeout(Duration::from_secs(network.read_timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
            retry: RetryPolicy::from_config(network),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        Self::new(&config.server_url, config.api_key.clone(), &config.network)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    /// Send a request, retrying transport failures. `build` is called once
    /// per attempt because a sent `RequestBuilder` is consumed.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match self.with_auth(build()).send().await {
                Ok(response) => return check_status(response).await,
                Err(e) if should_retry_transport_error(&e) && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Transport error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(map_transport_error(e)),
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = self.url(path);
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{path}: {e}")))
    }
}

fn should_retry_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!(status = code, body = %body, "Inference server returned an error");

    if code == 401 || code == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    Err(ProviderError::ApiError {
        status_code: code,
        message: body,
    })
}

#[derive(Serialize)]
struct ChatBody<'a> {
    messages: &'a [Message],
    options: ChatOptions<'a>,
}

#[derive(Serialize)]
struct ChatOptions<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[async_trait]
impl Provider for InferenceServerClient {
    fn name(&self) -> &str {
        "llmcode-server"
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let url = self.url("/api/v1/chat");
        let body = ChatBody {
            messages: &request.messages,
            options: ChatOptions {
                model: &request.model,
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            },
        };

        debug!(model = %request.model, messages = request.messages.len(), "Sending streaming chat request");

        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .header("Accept", "text/event-stream")
                    .json(&body)
            })
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Spawn task to read the SSE byte stream and forward events
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    let terminal = event.is_terminal();
                    if tx.send(Ok(event)).await.is_err() {
                        trace!("Stream receiver dropped, stopping reader");
                        return;
                    }
                    if terminal {
                        return;
                    }
                }
            }

            if let Some(event) = decoder.finish() {
                let _ = tx.send(Ok(event)).await;
            }
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response: ModelsResponse = self.get_json("/api/v1/models").await?;
        Ok(response.models)
    }

    async fn health_check(&self) -> Result<ServerHealth, ProviderError> {
        self.get_json("/api/v1/health").await
    }
}
