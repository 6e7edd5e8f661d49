//! Read file tool: whole files up to a line cap, or an exact line range.

use async_trait::async_trait;
use llmcode_core::error::ToolError;
use llmcode_core::tool::{Tool, ToolOutcome};
use serde_json::{Value, json};
use std::path::Path;

use crate::args::{optional_u64, required_str};

const NAME: &str = "read_file";
const DEFAULT_MAX_LINES: usize = 500;
/// Files above this size must be read with an explicit range.
const LARGE_FILE_BYTES: u64 = 1024 * 1024;

pub struct ReadFileTool;

struct ReadRequest {
    path: String,
    line_start: Option<usize>,
    line_end: Option<usize>,
    max_lines: usize,
}

fn read(req: ReadRequest) -> Result<Value, ToolError> {
    let path = Path::new(&req.path);
    if !path.exists() {
        return Err(ToolError::failed(NAME, format!("File not found: {}", req.path)));
    }
    if !path.is_file() {
        return Err(ToolError::failed(NAME, format!("Not a file: {}", req.path)));
    }

    let size = path
        .metadata()
        .map_err(|e| ToolError::failed(NAME, e.to_string()))?
        .len();
    let bytes = std::fs::read(path).map_err(|e| ToolError::failed(NAME, e.to_string()))?;
    let content = String::from_utf8_lossy(&bytes);
    let all_lines: Vec<&str> = content.split('\n').collect();
    let total_lines = all_lines.len();

    if size > LARGE_FILE_BYTES && req.line_start.is_none() {
        return Err(ToolError::failed(
            NAME,
            format!(
                "File too large: {} ({}KB, {total_lines} lines). Use search_code first to find line numbers, then read_file with line_start/line_end",
                req.path,
                size / 1024
            ),
        ));
    }

    if let Some(line_start) = req.line_start {
        let start_idx = line_start.saturating_sub(1);
        let end_idx = req
            .line_end
            .unwrap_or(start_idx + req.max_lines)
            .min(total_lines);
        let lines = if start_idx < end_idx { &all_lines[start_idx..end_idx] } else { &[][..] };
        let numbered: Vec<String> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}: {line}", start_idx + i + 1))
            .collect();

        return Ok(json!({
            "path": req.path,
            "content": numbered.join("\n"),
            "line_range": format!("{}-{end_idx}", start_idx + 1),
            "total_lines": total_lines,
            "lines_read": lines.len(),
        }));
    }

    let truncated = total_lines > req.max_lines;
    let lines = &all_lines[..total_lines.min(req.max_lines)];
    let mut result = json!({
        "path": req.path,
        "content": lines.join("\n"),
        "lines": lines.len(),
        "total_lines": total_lines,
        "truncated": truncated,
    });
    if truncated {
        result["hint"] = json!("Use line_start/line_end to read specific sections");
    }
    Ok(result)
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read file content (supports line ranges for large files)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path to read" },
                "line_start": { "type": "integer", "description": "Start line number (1-based, optional)" },
                "line_end": { "type": "integer", "description": "End line number (optional)" },
                "max_lines": { "type": "integer", "description": "Maximum lines to return (default: 500)" }
            },
            "required": ["path"]
        })
    }

    fn examples(&self) -> Vec<Value> {
        vec![
            json!({ "path": "file.py" }),
            json!({ "path": "file.py", "line_start": 100, "line_end": 150 }),
        ]
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let req = ReadRequest {
            path: required_str(&arguments, "path")?.to_string(),
            line_start: optional_u64(&arguments, "line_start")?.map(|n| n as usize),
            // 0 means "not given"
            line_end: optional_u64(&arguments, "line_end")?
                .filter(|n| *n > 0)
                .map(|n| n as usize),
            max_lines: optional_u64(&arguments, "max_lines")?
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_LINES),
        };

        tokio::task::spawn_blocking(move || read(req))
            .await
            .map_err(|e| ToolError::failed(NAME, e.to_string()))?
            .map(ToolOutcome::Ok)
    }
}
