//! Case-insensitive text search across source files.

use async_trait::async_trait;
use glob::Pattern;
use llmcode_core::error::ToolError;
use llmcode_core::text::clip;
use llmcode_core::tool::{Tool, ToolOutcome};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::args::{optional_str, required_str};

const NAME: &str = "search_code";
const MAX_MATCHES: usize = 50;
const MAX_LINE_CHARS: usize = 200;

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "cpp", "c", "h", "java", "go", "rs", "md", "json", "yaml", "yml",
];
const SKIPPED_COMPONENTS: &[&str] = &["node_modules", "__pycache__", ".git", "venv", ".venv"];

pub struct SearchCodeTool;

enum FileFilter {
    Extensions,
    Glob(Pattern),
}

impl FileFilter {
    fn from_arg(file_pattern: Option<&str>) -> Result<Self, ToolError> {
        match file_pattern.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(Self::Extensions),
            Some(raw) => Pattern::new(raw)
                .map(Self::Glob)
                .map_err(|e| ToolError::InvalidArguments(format!("Invalid file_pattern '{raw}': {e}"))),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        match self {
            Self::Extensions => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext)),
            Self::Glob(pattern) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| pattern.matches(name)),
        }
    }
}

fn is_skipped(name: &str) -> bool {
    SKIPPED_COMPONENTS.contains(&name)
}

fn search(query: String, root: PathBuf, filter: FileFilter) -> Result<Value, ToolError> {
    if !root.exists() {
        return Err(ToolError::failed(
            NAME,
            format!("Path not found: {}", root.display()),
        ));
    }

    let needle = query.to_lowercase();
    let mut matches = Vec::new();
    let mut truncated = false;

    let files = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_str().is_some_and(is_skipped))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && filter.accepts(e.path()));

    'files: for entry in files {
        // Binary or unreadable files are skipped
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let display = entry
            .path()
            .strip_prefix(&root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| entry.path().to_string_lossy().into_owned());

        for (index, line) in content.lines().enumerate() {
            if !line.to_lowercase().contains(&needle) {
                continue;
            }
            if matches.len() == MAX_MATCHES {
                truncated = true;
                break 'files;
            }
            matches.push(json!({
                "file": display,
                "line": index + 1,
                "content": clip(line.trim(), MAX_LINE_CHARS),
            }));
        }
    }

    Ok(json!({
        "query": query,
        "total": matches.len(),
        "matches": matches,
        "truncated": truncated,
    }))
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search text in project files (case-insensitive)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to search for" },
                "path": { "type": "string", "description": "Directory to search (default: current)" },
                "file_pattern": { "type": "string", "description": "File name glob, e.g. *.rs" }
            },
            "required": ["query"]
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![json!({ "query": "def main", "path": "." })]
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let query = required_str(&arguments, "query")?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'query' must not be empty".into()));
        }
        let root = PathBuf::from(optional_str(&arguments, "path")?.unwrap_or("."));
        let filter = FileFilter::from_arg(optional_str(&arguments, "file_pattern")?)?;
        let query = query.to_string();

        tokio::task::spawn_blocking(move || search(query, root, filter))
            .await
            .map_err(|e| ToolError::failed(NAME, e.to_string()))?
            .map(ToolOutcome::Ok)
    }
}
