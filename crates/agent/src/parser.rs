//! Tool-call parser.
//!
//! Models wrap their calls in whichever convention the prompt (or their
//! training) suggests, so extraction is an ordered list of independent
//! matchers, each yielding raw JSON candidates. One shared decode step
//! turns candidates into [`ToolCall`]s; a candidate that fails to decode is
//! dropped on its own. Results keep first-seen order and are deduplicated
//! by value, so the same call wrapped two ways runs once.

use llmcode_core::tool::ToolCall;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::trace;

static TAGGED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>\s*(\{.*?\})\s*</tool_call>").expect("tagged block regex")
});

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fenced block regex")
});

static BARE_OBJECT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*"tool"\s*:"#).expect("bare object regex"));

/// One wrapping convention.
pub trait CallMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw JSON substrings that may hold a call, in text order.
    fn candidates<'t>(&self, text: &'t str) -> Vec<&'t str>;
}

/// `<tool_call>{...}</tool_call>`
pub struct TaggedBlock;

impl CallMatcher for TaggedBlock {
    fn name(&self) -> &'static str {
        "tagged"
    }

    fn candidates<'t>(&self, text: &'t str) -> Vec<&'t str> {
        TAGGED_BLOCK
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect()
    }
}

/// A fenced code block, optionally tagged `json`, holding an object with a
/// `"tool"` key.
pub struct FencedBlock;

impl CallMatcher for FencedBlock {
    fn name(&self) -> &'static str {
        "fenced"
    }

    fn candidates<'t>(&self, text: &'t str) -> Vec<&'t str> {
        FENCED_BLOCK
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|body| body.starts_with('{') && body.contains("\"tool\""))
            .collect()
    }
}

/// A bare `{"tool": ...}` object anywhere in the text.
pub struct BareObject;

impl CallMatcher for BareObject {
    fn name(&self) -> &'static str {
        "bare"
    }

    fn candidates<'t>(&self, text: &'t str) -> Vec<&'t str> {
        BARE_OBJECT_START
            .find_iter(text)
            .filter_map(|m| balanced_object(text, m.start()))
            .collect()
    }
}

/// The JSON object starting at byte `start` (which must be `{`), found by
/// brace counting that skips braces inside strings. `None` if it never
/// closes.
fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode one candidate. Requires a string `tool`; `args` defaults to an
/// empty object.
fn decode(candidate: &str) -> Option<ToolCall> {
    let value: Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, "Skipping undecodable tool-call candidate");
            return None;
        }
    };
    let tool = value.get("tool")?.as_str()?.trim();
    if tool.is_empty() {
        return None;
    }
    let args = value.get("args").cloned().unwrap_or(Value::Null);
    Some(ToolCall::new(tool, args))
}

pub struct ToolCallParser {
    matchers: Vec<Box<dyn CallMatcher>>,
}

impl ToolCallParser {
    pub fn new(matchers: Vec<Box<dyn CallMatcher>>) -> Self {
        Self { matchers }
    }

    /// Every call in `text`, first occurrence wins. Never panics.
    pub fn parse(&self, text: &str) -> Vec<ToolCall> {
        let mut calls: Vec<ToolCall> = Vec::new();
        for matcher in &self.matchers {
            for call in matcher.candidates(text).into_iter().filter_map(decode) {
                if !calls.contains(&call) {
                    trace!(matcher = matcher.name(), tool = %call.tool, "Parsed tool call");
                    calls.push(call);
                }
            }
        }
        calls
    }
}

impl Default for ToolCallParser {
    fn default() -> Self {
        Self::new(vec![
            Box::new(TaggedBlock),
            Box::new(FencedBlock),
            Box::new(BareObject),
        ])
    }
}

/// Parse with the default matchers.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    static PARSER: LazyLock<ToolCallParser> = LazyLock::new(ToolCallParser::default);
    PARSER.parse(text)
}
