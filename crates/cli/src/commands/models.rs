//! `llmcode models`: list what the server can run.

use crossterm::style::Stylize;
use llmcode_core::provider::Provider;

use super::{CommandResult, load_config, server_client};

pub async fn run() -> CommandResult {
    let (_, config) = load_config()?;
    let client = server_client(&config)?;

    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No models reported by {}", config.server_url);
        return Ok(());
    }

    for model in models {
        let marker = if model.name == config.default_model { "*" } else { " " };
        let kind = model.kind.as_deref().unwrap_or("chat");
        let size = model
            .size_gb
            .map(|gb| format!("{gb:.1} GB"))
            .unwrap_or_default();
        println!("{marker} {} {kind:<10} {}", format!("{:<32}", model.name).bold(), size.dim());
    }

    Ok(())
}
