pub mod chat;
pub mod clear;
pub mod init;
pub mod models;
pub mod status;

use llmcode_config::AppConfig;
use llmcode_providers::InferenceServerClient;
use std::path::PathBuf;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// The project directory every command works on.
pub fn project_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    std::env::current_dir().map_err(|e| format!("Cannot read current directory: {e}").into())
}

pub fn load_config() -> Result<(PathBuf, AppConfig), Box<dyn std::error::Error>> {
    let dir = project_dir()?;
    let config = AppConfig::load(&dir).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok((dir, config))
}

pub fn server_client(config: &AppConfig) -> Result<InferenceServerClient, Box<dyn std::error::Error>> {
    InferenceServerClient::from_config(config).map_err(|e| format!("Cannot create server client: {e}").into())
}
