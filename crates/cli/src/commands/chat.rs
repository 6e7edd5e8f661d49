//! `llmcode chat`: interactive or single-message chat.

use crossterm::style::Stylize;
use llmcode_agent::{AgentLoop, CtrlC};
use llmcode_core::provider::Provider;
use llmcode_memory::FileHistory;
use llmcode_providers::supervisor::build_from_config;
use llmcode_tools::{RegistryOptions, default_registry};
use std::sync::Arc;

use super::{CommandResult, load_config, server_client};
use crate::session::{ChatSession, HELP, SlashCommand, parse_command};
use crate::terminal::{Input, TerminalConfirmer, TerminalSink};

pub async fn run(message: Option<String>, model: Option<String>, supervisor_flag: bool) -> CommandResult {
    let (dir, mut config) = load_config()?;
    if let Some(model) = model {
        config.default_model = model;
    }

    let provider: Arc<dyn Provider> = Arc::new(server_client(&config)?);

    let supervisor = build_from_config(&config.supervisor);
    let supervisor_on = supervisor_flag || config.supervisor.enabled;
    if supervisor_on && supervisor.is_none() {
        eprintln!(
            "{} Supervisor backend unavailable (no API key?); continuing without it",
            "!".yellow()
        );
    }

    let tools = Arc::new(default_registry(RegistryOptions {
        shell_timeout_secs: config.shell.timeout_secs,
        supervisor: supervisor.clone(),
    }));

    let input = Arc::new(Input::stdin());
    let agent = AgentLoop::new(provider, config.default_model.clone(), tools)
        .with_config(&config)
        .with_sink(Arc::new(TerminalSink))
        .with_confirmer(Arc::new(TerminalConfirmer::new(input.clone())))
        .with_interrupts(Arc::new(CtrlC));

    let history = Arc::new(FileHistory::for_project(&dir, config.history.max_messages));
    let mut session = ChatSession::new(agent, history, dir.clone())
        .with_history_window(config.agent.history_limit, config.history.keep_recent)
        .with_supervisor(supervisor, config.supervisor.keywords.clone(), supervisor_on);

    if let Some(message) = message {
        session.turn(&message).await?;
        return Ok(());
    }

    println!("{}", "llmcode".bold());
    println!("  Project:    {}", dir.display());
    println!("  Model:      {}", config.default_model);
    println!(
        "  Supervisor: {}",
        if session.supervisor_active() { "on" } else { "off" }
    );
    println!("{}", "  /help for commands, Ctrl+C stops a response".dim());

    loop {
        let prompt = format!("\n{} ", "You >".cyan().bold());
        let line = tokio::select! {
            line = input.read_line(&prompt) => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = parse_command(line) {
            match command {
                SlashCommand::Quit => break,
                SlashCommand::Clear => match session.clear().await {
                    Ok(()) => println!("{}", "History cleared".dim()),
                    Err(e) => eprintln!("{} {e}", "Error:".red().bold()),
                },
                SlashCommand::Supervisor(None) => {
                    let state = if session.supervisor_active() { "on" } else { "off" };
                    println!("Supervisor mode is {state}");
                }
                SlashCommand::Supervisor(Some(on)) => match session.set_supervisor(on) {
                    Ok(()) => println!("Supervisor mode {}", if on { "on" } else { "off" }),
                    Err(e) => eprintln!("{} {e}", "Error:".red().bold()),
                },
                SlashCommand::Help => println!("{HELP}"),
                SlashCommand::Unknown(text) => {
                    eprintln!("Unknown command: {text} (try /help)");
                }
            }
            continue;
        }

        println!();
        if let Err(e) = session.turn(line).await {
            eprintln!("{} {e}", "Error:".red().bold());
        }
    }

    println!("{}", "Bye".dim());
    Ok(())
}
