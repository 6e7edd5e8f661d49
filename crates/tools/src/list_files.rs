//! List files tool: directory listing with noise directories skipped.

use async_trait::async_trait;
use llmcode_core::error::ToolError;
use llmcode_core::tool::{Tool, ToolOutcome};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::args::{optional_bool, optional_str, optional_u64};

const NAME: &str = "list_files";
const MAX_DIRS: usize = 50;
const MAX_FILES: usize = 100;
const DEFAULT_MAX_DEPTH: u64 = 2;

/// Entry names never listed, on top of anything starting with a dot.
pub(crate) const IGNORED_NAMES: &[&str] = &["node_modules", "__pycache__", "venv", ".venv", "build", "dist"];

pub struct ListFilesTool;

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || IGNORED_NAMES.contains(&name)
}

fn list(base: &Path, display: &str, recursive: bool, max_depth: usize) -> Result<Value, ToolError> {
    if !base.exists() {
        return Err(ToolError::failed(NAME, format!("Path not found: {display}")));
    }
    if !base.is_dir() {
        return Err(ToolError::failed(NAME, format!("Not a directory: {display}")));
    }

    // Children of `base` sit at walk depth 1
    let walk_depth = if recursive { max_depth + 1 } else { 1 };

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(walk_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(&e.file_name().to_string_lossy()));

    for entry in walker.filter_map(Result::ok) {
        let rel = entry
            .path()
            .strip_prefix(base)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if entry.file_type().is_dir() {
            dirs.push(format!("{rel}/"));
        } else {
            files.push(rel);
        }
    }

    Ok(json!({
        "path": base.to_string_lossy(),
        "total_dirs": dirs.len(),
        "total_files": files.len(),
        "directories": dirs.into_iter().take(MAX_DIRS).collect::<Vec<_>>(),
        "files": files.into_iter().take(MAX_FILES).collect::<Vec<_>>(),
    }))
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List files and directories in a path"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory path (default: current directory)" },
                "recursive": { "type": "boolean", "description": "Include subdirectories (default: false)" },
                "max_depth": { "type": "integer", "description": "How deep to recurse (default: 2)" }
            }
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![json!({ "path": "." })]
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let display = optional_str(&arguments, "path")?.unwrap_or(".").to_string();
        let recursive = optional_bool(&arguments, "recursive")?.unwrap_or(false);
        let max_depth = optional_u64(&arguments, "max_depth")?.unwrap_or(DEFAULT_MAX_DEPTH) as usize;

        let base = PathBuf::from(&display);
        tokio::task::spawn_blocking(move || list(&base, &display, recursive, max_depth))
            .await
            .map_err(|e| ToolError::failed(NAME, e.to_string()))?
            .map(ToolOutcome::Ok)
    }
}
