//! Write file tool: proposes a full-content replacement.
//!
//! The handler only reads the current content to build a preview. The file
//! is touched by [`commit`], which the agent loop calls after confirmation.

use async_trait::async_trait;
use llmcode_core::error::ToolError;
use llmcode_core::tool::{Proposal, Tool, ToolOutcome};
use serde_json::{Value, json};
use std::path::Path;
use tracing::{debug, info};

use crate::args::required_str;

const NAME: &str = "write_file";

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Write content to a file (creates or replaces it, asks the user first)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path to write" },
                "content": { "type": "string", "description": "The complete new file content" }
            },
            "required": ["path", "content"]
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![json!({ "path": "file.py", "content": "print('hello')\n" })]
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let path = required_str(&arguments, "path")?;
        let content = required_str(&arguments, "content")?;

        let target = Path::new(path);
        if target.is_dir() {
            return Err(ToolError::failed(NAME, format!("Path is a directory: {path}")));
        }

        let exists = target.is_file();
        let old_content = if exists {
            tokio::fs::read_to_string(target)
                .await
                .map_err(|e| ToolError::failed(NAME, format!("Cannot read {path}: {e}")))?
        } else {
            String::new()
        };

        debug!(path, exists, "Proposing file write");
        Ok(ToolOutcome::NeedsConfirmation(Proposal::WriteFile {
            path: path.to_string(),
            exists,
            old_content,
            new_content: content.to_string(),
        }))
    }
}

/// Perform a confirmed write: create parent directories and replace the
/// whole file with `content`.
pub async fn commit(path: &str, content: &str) -> ToolOutcome {
    let target = Path::new(path);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        return ToolOutcome::error(format!("Cannot create directory {}: {e}", parent.display()));
    }

    match tokio::fs::write(target, content).await {
        Ok(()) => {
            info!(path, bytes = content.len(), "File written");
            ToolOutcome::Ok(json!({
                "success": true,
                "path": path,
                "message": "File updated",
            }))
        }
        Err(e) => ToolOutcome::error(format!("Cannot write {path}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn proposal_for_new_file_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let outcome = WriteFileTool
            .execute(json!({"path": path.to_str().unwrap(), "content": "hi"}))
            .await
            .unwrap();

        match outcome {
            ToolOutcome::NeedsConfirmation(Proposal::WriteFile {
                exists,
                old_content,
                new_content,
                ..
            }) => {
                assert!(!exists);
                assert!(old_content.is_empty());
                assert_eq!(new_content, "hi");
            }
            other => panic!("expected a proposal, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn proposal_carries_old_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.txt");
        std::fs::write(&path, "old\n").unwrap();

        let outcome = WriteFileTool
            .execute(json!({"path": path.to_str().unwrap(), "content": "new\n"}))
            .await
            .unwrap();
        let json = outcome.to_json();
        assert_eq!(json["exists"], true);
        assert_eq!(json["old_content"], "old\n");
        assert_eq!(json["requires_confirmation"], true);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\n");
    }

    #[tokio::test]
    async fn directory_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = WriteFileTool
            .execute(json!({"path": dir.path().to_str().unwrap(), "content": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Path is a directory"));
    }

    #[tokio::test]
    async fn commit_creates_parents_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/er/c.txt");
        let outcome = commit(path.to_str().unwrap(), "content").await;

        assert_eq!(outcome.to_json()["message"], "File updated");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }
}
