//! Run command tool: proposes a shell command; [`run_confirmed`] runs it.
//!
//! The denylist is a coarse heuristic against obviously destructive input.
//! It is not a sandbox.

use async_trait::async_trait;
use llmcode_core::error::ToolError;
use llmcode_core::text::truncate_with_suffix;
use llmcode_core::tool::{Proposal, Tool, ToolOutcome};
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args::{optional_str, optional_u64, required_str};

const NAME: &str = "run_command";

/// Case-insensitive substrings that block a command outright.
pub const DENYLIST: &[&str] = &["rm -rf", "del /", "format", "mkfs", ":(){", "fork bomb"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OUTPUT_LIMIT: usize = 5000;

pub struct RunCommandTool {
    default_timeout_secs: u64,
}

impl RunCommandTool {
    pub fn new(default_timeout_secs: u64) -> Self {
        Self {
            default_timeout_secs,
        }
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

/// The denylist entry `command` trips, if any.
pub fn blocked_pattern(command: &str) -> Option<&'static str> {
    let lowered = command.to_lowercase();
    DENYLIST.iter().copied().find(|p| lowered.contains(p))
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Run a shell command in the project (asks the user first)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to run" },
                "path": { "type": "string", "description": "Working directory (default: current)" },
                "timeout": { "type": "integer", "description": "Timeout in seconds (default: 30)" }
            },
            "required": ["command"]
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![json!({ "command": "cargo test", "path": "." })]
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let command = required_str(&arguments, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'command' must not be empty".into()));
        }
        if let Some(pattern) = blocked_pattern(command) {
            warn!(command, pattern, "Dangerous command blocked");
            return Err(ToolError::Blocked(format!("Dangerous command blocked: {pattern}")));
        }

        let cwd = optional_str(&arguments, "path")?.unwrap_or(".");
        let timeout_secs = optional_u64(&arguments, "timeout")?
            .filter(|t| *t > 0)
            .unwrap_or(self.default_timeout_secs);

        Ok(ToolOutcome::NeedsConfirmation(Proposal::RunCommand {
            command: command.to_string(),
            cwd: cwd.to_string(),
            timeout_secs,
        }))
    }
}

fn shell(command: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run a confirmed command in `cwd`. Stdout and stderr are concatenated and
/// truncated at `output_limit` characters. On timeout the child is killed.
pub async fn run_confirmed(
    command: &str,
    cwd: &str,
    timeout_secs: u64,
    output_limit: usize,
) -> ToolOutcome {
    debug!(command, cwd, timeout_secs, "Running confirmed command");

    let child = match shell(command).current_dir(cwd).spawn() {
        Ok(child) => child,
        Err(e) => return ToolOutcome::error(format!("Failed to start command: {e}")),
    };

    // Dropping the wait future drops the child, which kills it.
    let output = match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        child.wait_with_output(),
    )
    .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return ToolOutcome::error(format!("Command failed: {e}")),
        Err(_) => {
            warn!(command, timeout_secs, "Command timed out");
            return ToolOutcome::error("Command timed out");
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let returncode = output.status.code().unwrap_or(-1);

    ToolOutcome::Ok(json!({
        "success": output.status.success(),
        "returncode": returncode,
        "output": truncate_with_suffix(&text, output_limit),
    }))
}
