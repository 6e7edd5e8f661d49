//! `llmcode clear`: forget this project's conversation.

use crossterm::style::Stylize;
use llmcode_core::history::HistoryStore;
use llmcode_memory::FileHistory;

use super::{CommandResult, load_config};

pub async fn run() -> CommandResult {
    let (dir, config) = load_config()?;
    let history = FileHistory::for_project(&dir, config.history.max_messages);
    history.clear().await?;
    println!("{} Cleared history and summary", "✓".green());
    Ok(())
}
