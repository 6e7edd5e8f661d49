//! llmcode CLI: the main entry point.
//!
//! Commands:
//! - `init`    - Write the global config and check the server
//! - `status`  - Show configuration, server health and history
//! - `models`  - List models the server can run
//! - `chat`    - Interactive chat or single-message mode
//! - `clear`   - Forget this project's conversation

use clap::{Parser, Subcommand};

mod commands;
mod session;
mod terminal;

#[derive(Parser)]
#[command(
    name = "llmcode",
    about = "llmcode: a coding assistant for your terminal",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the global configuration and check the server
    Init {
        /// Inference server URL
        #[arg(long)]
        server: Option<String>,

        /// Inference server API key
        #[arg(long)]
        api_key: Option<String>,

        /// Default model
        #[arg(long)]
        model: Option<String>,
    },

    /// Show configuration, server health and history
    Status,

    /// List models offered by the server
    Models,

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Override the model
        #[arg(long)]
        model: Option<String>,

        /// Start with supervisor mode on
        #[arg(long)]
        supervisor: bool,
    },

    /// Clear this project's history and summary
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with streamed model text
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init {
            server,
            api_key,
            model,
        } => commands::init::run(server, api_key, model).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Models => commands::models::run().await?,
        Commands::Chat {
            message,
            model,
            supervisor,
        } => commands::chat::run(message, model, supervisor).await?,
        Commands::Clear => commands::clear::run().await?,
    }

    Ok(())
}
