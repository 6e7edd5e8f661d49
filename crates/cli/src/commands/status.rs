//! `llmcode status`: effective configuration, server health and history.

use crossterm::style::Stylize;
use llmcode_core::history::HistoryStore;
use llmcode_core::provider::Provider;
use llmcode_memory::FileHistory;

use super::{CommandResult, load_config, server_client};

fn redacted(secret: &Option<String>) -> &'static str {
    if secret.is_some() { "(set)" } else { "(not set)" }
}

pub async fn run() -> CommandResult {
    let (dir, config) = load_config()?;

    println!("{}", "llmcode status".bold());
    println!("  Project:      {}", dir.display());
    println!("  Config dir:   {}", llmcode_config::AppConfig::config_dir().display());
    println!("  Server:       {}", config.server_url);
    println!("  API key:      {}", redacted(&config.api_key));
    println!("  Model:        {}", config.default_model);
    println!("  Iterations:   {}", config.agent.max_iterations);
    println!(
        "  Supervisor:   {} ({:?}, {})",
        if config.supervisor.enabled { "enabled" } else { "disabled" },
        config.supervisor.backend,
        redacted(&config.supervisor.api_key)
    );

    let client = server_client(&config)?;
    match client.health_check().await {
        Ok(health) => {
            let label = if health.is_healthy() {
                health.status.clone().green()
            } else {
                health.status.clone().yellow()
            };
            println!("  Health:       {label}");
            for (key, value) in &health.details {
                println!("    {key}: {value}");
            }
        }
        Err(e) => println!("  Health:       {}", format!("unreachable ({e})").red()),
    }

    let history = FileHistory::for_project(&dir, config.history.max_messages);
    let messages = history.len().await?;
    let summary = history.get_summary().await?;
    println!("  History:      {messages} messages ({})", history.path().display());
    println!(
        "  Summary:      {}",
        if summary.trim().is_empty() { "none" } else { "present" }
    );

    Ok(())
}
