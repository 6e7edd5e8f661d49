//! `llmcode init`: write the global config, then check the server.

use crossterm::style::Stylize;
use llmcode_config::AppConfig;
use llmcode_core::provider::Provider;

use super::{CommandResult, server_client};

pub async fn run(server: Option<String>, api_key: Option<String>, model: Option<String>) -> CommandResult {
    let global = AppConfig::config_dir().join("config.toml");
    let mut config = if global.exists() {
        AppConfig::load_from(&global).map_err(|e| format!("Failed to load config: {e}"))?
    } else {
        AppConfig::default()
    };

    if let Some(server) = server {
        config.server_url = server;
    }
    if api_key.is_some() {
        config.api_key = api_key;
    }
    if let Some(model) = model {
        config.default_model = model;
    }
    config.validate()?;

    let path = config.save_global()?;
    println!("{} Saved configuration to {}", "✓".green(), path.display());
    println!("  Server: {}", config.server_url);
    println!("  Model:  {}", config.default_model);

    let client = server_client(&config)?;
    match client.health_check().await {
        Ok(health) if health.is_healthy() => {
            println!("{} Server is reachable ({})", "✓".green(), health.status);
        }
        Ok(health) => {
            println!("{} Server answered with status '{}'", "!".yellow(), health.status);
        }
        Err(e) => {
            println!("{} Server check failed: {e}", "✗".red());
        }
    }

    Ok(())
}
