//! Confirmation gate.
//!
//! Side-effecting tools hand back a [`Proposal`]. Only this module turns a
//! proposal into a real write or process spawn, and only after the
//! [`Confirmer`] says yes. Anything else becomes a cancellation.

use async_trait::async_trait;
use llmcode_core::text::clip;
use llmcode_core::tool::{Proposal, ToolOutcome};
use llmcode_tools::diff::LineDiff;
use llmcode_tools::{run_command, write_file};
use tracing::info;

use crate::stream_event::{AgentEvent, EventSink};

/// Characters of command output echoed to the user after a run.
const COMMAND_ECHO_CHARS: usize = 500;

/// What the human is being asked to approve.
#[derive(Debug)]
pub enum ConfirmRequest<'a> {
    WriteFile {
        path: &'a str,
        exists: bool,
        diff: &'a LineDiff,
    },
    RunCommand {
        command: &'a str,
        cwd: &'a str,
        timeout_secs: u64,
    },
    /// Hand the current request to the supervisor.
    Supervisor { reason: &'a str },
}

#[async_trait]
pub trait Confirmer: Send + Sync {
    /// `true` only on an explicit yes.
    async fn confirm(&self, request: ConfirmRequest<'_>) -> bool;
}

/// Answers every request the same way. Useful for non-interactive runs.
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirmer for FixedAnswer {
    async fn confirm(&self, _request: ConfirmRequest<'_>) -> bool {
        self.0
    }
}

/// Resolve a tool outcome through the gate. Outcomes that need no
/// confirmation pass through untouched.
pub(crate) async fn resolve(
    outcome: ToolOutcome,
    confirmer: &dyn Confirmer,
    sink: &dyn EventSink,
    output_limit: usize,
) -> ToolOutcome {
    let ToolOutcome::NeedsConfirmation(proposal) = outcome else {
        return outcome;
    };

    match proposal {
        Proposal::WriteFile {
            path,
            exists,
            old_content,
            new_content,
        } => {
            let diff = LineDiff::compute(&old_content, &new_content);
            let request = ConfirmRequest::WriteFile {
                path: &path,
                exists,
                diff: &diff,
            };
            if !confirmer.confirm(request).await {
                info!(%path, "Write declined");
                return ToolOutcome::user_cancelled();
            }
            write_file::commit(&path, &new_content).await
        }
        Proposal::RunCommand {
            command,
            cwd,
            timeout_secs,
        } => {
            let request = ConfirmRequest::RunCommand {
                command: &command,
                cwd: &cwd,
                timeout_secs,
            };
            if !confirmer.confirm(request).await {
                info!(%command, "Command declined");
                return ToolOutcome::user_cancelled();
            }
            let outcome =
                run_command::run_confirmed(&command, &cwd, timeout_secs, output_limit).await;
            if let ToolOutcome::Ok(payload) = &outcome
                && let Some(output) = payload["output"].as_str()
                && !output.trim().is_empty()
            {
                sink.emit(AgentEvent::CommandOutput {
                    output: clip(output, COMMAND_ECHO_CHARS).to_string(),
                });
            }
            outcome
        }
    }
}
