//! Supervisor backed by a local command-line tool.

use async_trait::async_trait;
use llmcode_config::SupervisorConfig;
use llmcode_core::supervisor::{Supervisor, supervisor_error};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct CliSupervisor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct Envelope {
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
}

impl CliSupervisor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(&config.command, config.command_args.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, input: String) -> Result<String, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start '{}': {e}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    warn!(error = %e, "Failed to write supervisor prompt");
                }
                // Dropping stdin closes the pipe so the tool sees EOF
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| format!("Timed out after {}s", self.timeout.as_secs()))?
            .map_err(|e| format!("Failed to read output: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ));
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Pull the answer out of the tool's stdout.
fn parse_output(stdout: &str) -> Result<String, String> {
    let trimmed = stdout.trim();
    match serde_json::from_str::<Envelope>(trimmed) {
        Ok(Envelope {
            result: Some(result),
            is_error: false,
        }) => Ok(result),
        Ok(Envelope {
            result: Some(result),
            is_error: true,
        }) => Err(result),
        Ok(Envelope { result: None, .. }) => Err("Response envelope has no result".into()),
        Err(_) if !trimmed.is_empty() => {
            debug!("Supervisor output is not a JSON envelope, using it verbatim");
            Ok(trimmed.to_string())
        }
        Err(_) => Err("Empty response".into()),
    }
}

#[async_trait]
impl Supervisor for CliSupervisor {
    fn name(&self) -> &str {
        "cli"
    }

    async fn chat(&self, prompt: &str, system: Option<&str>) -> String {
        let input = match system {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        debug!(program = %self.program, chars = input.len(), "Calling command-line supervisor");
        match self.run(input).await {
            Ok(text) => text,
            Err(reason) => {
                warn!(reason = %reason, "Command-line supervisor failed");
                supervisor_error(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmcode_core::supervisor::is_supervisor_error;

    #[test]
    fn envelope_parsing() {
        assert_eq!(parse_output(r#"{"type":"result","result":"Plan ready"}"#), Ok("Plan ready".into()));
        assert_eq!(parse_output("plain answer\n"), Ok("plain answer".into()));
        assert!(parse_output(r#"{"result":"quota","is_error":true}"#).is_err());
        assert!(parse_output("   ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prompt_goes_through_stdin() {
        // Echo stdin back inside an envelope
        let supervisor = CliSupervisor::new(
            "sh",
            vec![
                "-c".into(),
                r#"read line; printf '{"result":"%s"}' "$line""#.into(),
            ],
        );
        let reply = supervisor.chat("hello", None).await;
        assert_eq!(reply, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_prompt_is_prepended() {
        let supervisor = CliSupervisor::new("sh", vec!["-c".into(), "head -n 1".into()]);
        let reply = supervisor.chat("the question", Some("You are a planner")).await;
        assert_eq!(reply, "You are a planner");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failures_become_marked_text() {
        let missing = CliSupervisor::new("llmcode-no-such-binary", vec![]);
        assert!(is_supervisor_error(&missing.chat("hi", None).await));

        let failing = CliSupervisor::new("sh", vec!["-c".into(), "echo boom >&2; exit 3".into()]);
        let reply = failing.chat("hi", None).await;
        assert!(is_supervisor_error(&reply));
        assert!(reply.contains("boom"));

        let slow = CliSupervisor::new("sh", vec!["-c".into(), "sleep 5".into()])
            .with_timeout(Duration::from_millis(100));
        let reply = slow.chat("hi", None).await;
        assert!(reply.contains("Timed out"));
    }
}
