//! One chat session: builds each turn's messages from the persisted
//! history, runs the agent, and writes the turn back.

use llmcode_agent::{
    AgentLoop, ChatOutcome, PromptContext, SupervisorMode, compact_history, system_prompt,
};
use llmcode_core::error::HistoryError;
use llmcode_core::history::HistoryStore;
use llmcode_core::message::{Message, Role};
use llmcode_core::supervisor::Supervisor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// In-session commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Quit,
    Clear,
    /// `/supervisor on|off`; `None` shows the current state.
    Supervisor(Option<bool>),
    Help,
    Unknown(String),
}

pub const HELP: &str = "\
/quit, /exit         leave the session
/clear               forget this project's history and summary
/supervisor on|off   toggle supervisor mode
/help                show this help";

/// Parse a line starting with `/`. Other lines are chat input.
pub fn parse_command(line: &str) -> Option<SlashCommand> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let mut words = rest.split_whitespace();
    let command = match words.next().unwrap_or("") {
        "quit" | "exit" => SlashCommand::Quit,
        "clear" => SlashCommand::Clear,
        "help" => SlashCommand::Help,
        "supervisor" => match words.next() {
            Some("on") => SlashCommand::Supervisor(Some(true)),
            Some("off") => SlashCommand::Supervisor(Some(false)),
            None => SlashCommand::Supervisor(None),
            Some(_) => SlashCommand::Unknown(line.to_string()),
        },
        _ => SlashCommand::Unknown(line.to_string()),
    };
    Some(command)
}

pub struct ChatSession {
    agent: AgentLoop,
    history: Arc<dyn HistoryStore>,
    project_dir: PathBuf,
    supervisor: Option<Arc<dyn Supervisor>>,
    supervisor_on: bool,
    keywords: Vec<String>,
    history_limit: usize,
    keep_recent: usize,
}

impl ChatSession {
    pub fn new(agent: AgentLoop, history: Arc<dyn HistoryStore>, project_dir: PathBuf) -> Self {
        Self {
            agent,
            history,
            project_dir,
            supervisor: None,
            supervisor_on: false,
            keywords: Vec::new(),
            history_limit: 20,
            keep_recent: 10,
        }
    }

    pub fn with_supervisor(
        mut self,
        supervisor: Option<Arc<dyn Supervisor>>,
        keywords: Vec<String>,
        on: bool,
    ) -> Self {
        self.supervisor_on = on && supervisor.is_some();
        self.supervisor = supervisor;
        self.keywords = keywords;
        self
    }

    /// How many stored messages go into each turn, and how many survive
    /// compaction.
    pub fn with_history_window(mut self, limit: usize, keep_recent: usize) -> Self {
        self.history_limit = limit;
        self.keep_recent = keep_recent;
        self
    }

    pub fn supervisor_active(&self) -> bool {
        self.supervisor_on && self.supervisor.is_some()
    }

    /// Turn supervisor mode on or off. Fails when no backend is configured.
    pub fn set_supervisor(&mut self, on: bool) -> Result<(), &'static str> {
        if on && self.supervisor.is_none() {
            return Err("No supervisor backend is configured");
        }
        self.supervisor_on = on;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.history.clear().await
    }

    /// Run one user turn and persist it.
    pub async fn turn(&self, input: &str) -> Result<ChatOutcome, HistoryError> {
        let summary = self.history.get_summary().await?;
        let prior = self.history.get_messages(self.history_limit).await?;
        let project_dir = self.project_dir.to_string_lossy();

        let system = system_prompt(
            self.agent.tools(),
            PromptContext {
                summary: Some(summary.as_str()),
                project_dir: Some(project_dir.as_ref()),
                supervisor_enabled: self.supervisor_active(),
            },
        );

        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(Message::system(system));
        messages.extend(prior);
        messages.push(Message::user(input));

        let mode = match &self.supervisor {
            Some(supervisor) if self.supervisor_on => {
                Some(SupervisorMode::new(supervisor.clone(), self.keywords.clone()))
            }
            _ => None,
        };

        let outcome = self.agent.agent_chat(messages, &self.project_dir, mode).await;

        self.history.add_message(Role::User, input).await?;
        if !outcome.response.trim().is_empty() {
            self.history.add_message(Role::Assistant, &outcome.response).await?;
        }

        if let Err(e) = compact_history(
            self.history.as_ref(),
            self.agent.provider().as_ref(),
            self.agent.model(),
            self.keep_recent,
        )
        .await
        {
            warn!(error = %e, "History compaction failed");
        }

        Ok(outcome)
    }
}
