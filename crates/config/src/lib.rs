//! Configuration loading, validation, and management for llmcode.
//!
//! Two TOML layers are read and deep-merged, project over global:
//!
//! - global:  `~/.llmcode/config.toml`
//! - project: `<project>/.llmcode/config.toml`
//!
//! Environment variables override both, then the result is validated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-user and per-project state directory.
pub const STATE_DIR: &str = ".llmcode";

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the inference server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Key sent to the inference server as `X-API-Key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature forwarded to the server, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Generation cap forwarded to the server, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

fn default_server_url() -> String {
    "http://localhost:8000".into()
}
fn default_model() -> String {
    "llama3.2:3b".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server_url", &self.server_url)
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("network", &self.network)
            .field("shell", &self.shell)
            .field("history", &self.history)
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

/// Agent loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Characters held back while scanning for think markers
    #[serde(default = "default_lookback_chars")]
    pub lookback_chars: usize,

    /// Per-result cap inside the tool-results message
    #[serde(default = "default_result_char_limit")]
    pub result_char_limit: usize,

    /// Number of stored messages replayed into each new turn
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_lookback_chars() -> usize {
    10
}
fn default_result_char_limit() -> usize {
    3000
}
fn default_history_limit() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            lookback_chars: default_lookback_chars(),
            result_char_limit: default_result_char_limit(),
            history_limit: default_history_limit(),
        }
    }
}

/// Transport timeouts and retry policy for the inference server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_output_char_limit")]
    pub output_char_limit: usize,
}

fn default_shell_timeout() -> u64 {
    30
}
fn default_output_char_limit() -> usize {
    5000
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout(),
            output_char_limit: default_output_char_limit(),
        }
    }
}

/// Conversation history compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Compress once more than this many messages are stored
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Messages kept verbatim after compression
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_max_messages() -> usize {
    40
}
fn default_keep_recent() -> usize {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            keep_recent: default_keep_recent(),
        }
    }
}

/// Which supervisor transport to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorBackend {
    /// A local command-line tool fed over stdin
    Cli,
    /// The remote messages API
    Api,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_backend")]
    pub backend: SupervisorBackend,

    #[serde(default = "default_supervisor_command")]
    pub command: String,

    #[serde(default = "default_supervisor_args")]
    pub command_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_supervisor_api_url")]
    pub api_url: String,

    #[serde(default = "default_supervisor_model")]
    pub model: String,

    #[serde(default = "default_supervisor_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_supervisor_timeout")]
    pub timeout_secs: u64,

    /// Words in the user's request that suggest a hand-off
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

fn default_backend() -> SupervisorBackend {
    SupervisorBackend::Cli
}
fn default_supervisor_command() -> String {
    "claude".into()
}
fn default_supervisor_args() -> Vec<String> {
    vec!["-p".into(), "--output-format".into(), "json".into()]
}
fn default_supervisor_api_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_supervisor_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_supervisor_max_tokens() -> u32 {
    4096
}
fn default_supervisor_timeout() -> u64 {
    120
}
fn default_keywords() -> Vec<String> {
    vec!["claude".into(), "supervisor".into()]
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_backend(),
            command: default_supervisor_command(),
            command_args: default_supervisor_args(),
            api_key: None,
            api_url: default_supervisor_api_url(),
            model: default_supervisor_model(),
            max_tokens: default_supervisor_max_tokens(),
            timeout_secs: default_supervisor_timeout(),
            keywords: default_keywords(),
        }
    }
}

impl std::fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("enabled", &self.enabled)
            .field("backend", &self.backend)
            .field("command", &self.command)
            .field("command_args", &self.command_args)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("keywords", &self.keywords)
            .finish()
    }
}

impl AppConfig {
    /// Load the effective configuration for a project directory.
    ///
    /// Environment overrides (highest priority):
    /// - `LLMCODE_SERVER_URL`
    /// - `LLMCODE_API_KEY`
    /// - `LLMCODE_MODEL`
    /// - `ANTHROPIC_API_KEY` (only fills an unset `supervisor.api_key`)
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let global = Self::config_dir().join("config.toml");
        let project = Self::project_config_path(project_dir);
        let mut config = Self::load_layers(&[global.as_path(), project.as_path()])?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load_layers(&[path])?;
        config.validate()?;
        Ok(config)
    }

    /// Merge the given files in order (later wins). Missing files are skipped.
    fn load_layers(paths: &[&Path]) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();

        for path in paths {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "No config file, skipping layer");
                continue;
            }

            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            let layer: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            tracing::debug!(path = %path.display(), "Loaded config layer");
            merge_tables(&mut merged, layer);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: paths.last().map(|p| p.to_path_buf()).unwrap_or_default(),
                reason: e.to_string(),
            })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LLMCODE_SERVER_URL") {
            self.server_url = url;
        }
        if let Ok(key) = std::env::var("LLMCODE_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("LLMCODE_MODEL") {
            self.default_model = model;
        }
        if self.supervisor.api_key.is_none() {
            self.supervisor.api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }
    }

    /// Get the global configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(STATE_DIR)
    }

    /// Path of a project's override file.
    pub fn project_config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(ConfigError::ValidationError("server_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "server_url must start with http:// or https:// (got '{url}')"
            )));
        }

        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.history.keep_recent >= self.history.max_messages {
            return Err(ConfigError::ValidationError(
                "history.keep_recent must be smaller than history.max_messages".into(),
            ));
        }

        if self.supervisor.enabled
            && self.supervisor.backend == SupervisorBackend::Api
            && self.supervisor.api_key.is_none()
        {
            return Err(ConfigError::ValidationError(
                "supervisor backend 'api' needs supervisor.api_key or ANTHROPIC_API_KEY".into(),
            ));
        }

        Ok(())
    }

    /// Write this configuration as the global config file.
    pub fn save_global(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_dir().join("config.toml");
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_key: None,
            default_model: default_model(),
            temperature: None,
            max_tokens: None,
            agent: AgentConfig::default(),
            network: NetworkConfig::default(),
            shell: ShellConfig::default(),
            history: HistoryConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

/// Recursively merge `overlay` into `base`; tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
