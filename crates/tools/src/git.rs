//! Git inspection tools: `git_status` and `git_diff`.

use async_trait::async_trait;
use llmcode_core::error::ToolError;
use llmcode_core::text::truncate_with_suffix;
use llmcode_core::tool::{Tool, ToolOutcome};
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::args::{optional_bool, optional_str};

const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const BRANCH_TIMEOUT: Duration = Duration::from_secs(5);
const DIFF_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DIFF_CHARS: usize = 10_000;

/// Run `git args...` in `dir`, returning stdout on success.
async fn git(tool: &str, dir: &str, args: &[&str], limit: Duration) -> Result<String, ToolError> {
    if !Path::new(dir).is_dir() {
        return Err(ToolError::failed(tool, format!("Path not found: {dir}")));
    }

    let run = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(limit, run).await {
        Err(_) => return Err(ToolError::failed(tool, "Git command timed out")),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ToolError::failed(tool, "Git not installed"));
        }
        Ok(Err(e)) => return Err(ToolError::failed(tool, e.to_string())),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(tool, ?args, stderr = %stderr.trim(), "git exited with failure");
        if stderr.to_lowercase().contains("not a git repository") {
            return Err(ToolError::failed(tool, "Not a git repository"));
        }
        return Err(ToolError::failed(tool, stderr.trim().to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `git status --porcelain` lines into `{status, file}` pairs.
fn parse_porcelain(text: &str) -> Vec<Value> {
    text.lines()
        .filter(|l| l.len() > 3)
        .map(|line| {
            let (status, file) = line.split_at(2);
            json!({ "status": status.trim(), "file": file.trim_start() })
        })
        .collect()
}

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show the current branch and changed files"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Repository directory (default: current)" }
            }
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![json!({ "path": "." })]
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let dir = optional_str(&arguments, "path")?.unwrap_or(".");
        let status = git(self.name(), dir, &["status", "--porcelain"], STATUS_TIMEOUT).await?;
        let branch = git(self.name(), dir, &["branch", "--show-current"], BRANCH_TIMEOUT)
            .await
            .map(|b| b.trim().to_string())
            .unwrap_or_default();

        let changes = parse_porcelain(&status);
        Ok(ToolOutcome::Ok(json!({
            "branch": branch,
            "total_changes": changes.len(),
            "clean": changes.is_empty(),
            "changes": changes,
        })))
    }
}

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show uncommitted changes (optionally staged, or for one file)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Repository directory (default: current)" },
                "file": { "type": "string", "description": "Limit the diff to this file" },
                "staged": { "type": "boolean", "description": "Show staged changes (default: false)" }
            }
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![
            json!({ "path": "." }),
            json!({ "path": ".", "file": "main.py", "staged": true }),
        ]
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let dir = optional_str(&arguments, "path")?.unwrap_or(".");
        let file = optional_str(&arguments, "file")?;
        let staged = optional_bool(&arguments, "staged")?.unwrap_or(false);

        let mut args = vec!["diff"];
        if staged {
            args.push("--staged");
        }
        if let Some(file) = file {
            args.extend(["--", file]);
        }

        let diff = git(self.name(), dir, &args, DIFF_TIMEOUT).await?;
        Ok(ToolOutcome::Ok(json!({
            "has_changes": !diff.trim().is_empty(),
            "diff": truncate_with_suffix(&diff, MAX_DIFF_CHARS),
            "staged": staged,
            "file": file,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_parsing() {
        let changes = parse_porcelain(" M src/lib.rs\n?? new file.txt\nA  added.rs\n");
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0], json!({"status": "M", "file": "src/lib.rs"}));
        assert_eq!(changes[1], json!({"status": "??", "file": "new file.txt"}));
        assert_eq!(changes[2], json!({"status": "A", "file": "added.rs"}));
    }

    #[tokio::test]
    async fn missing_directory_is_reported() {
        let err = GitStatusTool
            .execute(json!({"path": "/no/such/dir/anywhere"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Path not found: /no/such/dir/anywhere");
    }

    fn git_available() -> bool {
        std::process::Command::new("git").arg("--version").output().is_ok()
    }

    #[tokio::test]
    async fn outside_a_repository() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = GitStatusTool
            .execute(json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not a git repository");
    }

    #[tokio::test]
    async fn status_and_diff_in_fresh_repository() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let init = std::process::Command::new("git")
            .args(["init", "-q"])
            .current_dir(root)
            .status()
            .unwrap();
        assert!(init.success());
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();

        let status = GitStatusTool.execute(json!({"path": root})).await.unwrap().to_json();
        assert_eq!(status["clean"], false);
        assert_eq!(status["changes"][0], json!({"status": "??", "file": "a.txt"}));

        let diff = GitDiffTool.execute(json!({"path": root})).await.unwrap().to_json();
        // Untracked files do not show in an unstaged diff
        assert_eq!(diff["has_changes"], false);
        assert_eq!(diff["staged"], false);
        assert!(diff["file"].is_null());
    }
}
