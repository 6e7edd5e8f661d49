//! System prompt assembly.
//!
//! Rebuilt every turn so the rolling summary and the supervisor flag are
//! always current.

use llmcode_core::tool::ToolRegistry;
use std::fmt::Write as _;

const THINKING: &str = r#"You are a code assistant. Be accurate and thorough.

## Thinking Process
ALWAYS use <think> tags to analyze before acting:

<think>
- What does the user want exactly?
- What is the exact path/file mentioned? (Use FULL path if provided)
- What tools do I need?
- What could go wrong?
</think>

Use <think> tags also when:
- A tool fails: analyze why and how to fix
- Command output needs interpretation
- Complex decisions are required
"#;

const STRATEGY: &str = r#"
## Large File Strategy
For large files (>500 lines or truncated):
1. Use search_code to find relevant line numbers first
2. Then use read_file with line_start/line_end to read specific sections
3. Never try to read entire large files at once

## Rules
1. ALWAYS think first with <think> tags before using tools.
2. Use EXACT paths provided by the user. Never shorten or modify paths.
3. If a tool fails, analyze in <think> and retry with a corrected approach.
4. After task completion, give a brief summary. Don't show full file contents.
5. Respond in the same language as the user.
6. For file writes and commands, just call the tool. The user will confirm.

## Format
<tool_call>
{"tool": "tool_name", "args": {...}}
</tool_call>
"#;

const SUPERVISOR: &str = r#"
## Supervisor
A stronger supervisor model is available. Use ask_supervisor for a quick question.
If the whole task is beyond you, reply with:
<request_supervisor>reason: why you need help</request_supervisor>
"#;

/// Inputs for [`system_prompt`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Rolling summary of evicted history.
    pub summary: Option<&'a str>,

    /// The project directory, shown so the model can use absolute paths.
    pub project_dir: Option<&'a str>,

    pub supervisor_enabled: bool,
}

/// Build the system prompt for one turn.
pub fn system_prompt(tools: &ToolRegistry, context: PromptContext<'_>) -> String {
    let mut prompt = String::from(THINKING);

    prompt.push_str("\n## Tools\n");
    for tool in tools.iter() {
        if tool.name() == "ask_supervisor" && !context.supervisor_enabled {
            continue;
        }
        let _ = writeln!(prompt, "- {}: {}", tool.name(), tool.description());
        for example in tool.examples() {
            // Written by hand so `tool` precedes `args`.
            let _ = writeln!(
                prompt,
                "  {{\"tool\": \"{}\", \"args\": {example}}}",
                tool.name()
            );
        }
    }

    prompt.push_str(STRATEGY);
    if context.supervisor_enabled {
        prompt.push_str(SUPERVISOR);
    }

    prompt.push_str("\n## Context\n");
    prompt.push_str("You are a code assistant. Help the user understand and modify their code.\n");
    if let Some(dir) = context.project_dir {
        let _ = writeln!(prompt, "Project directory: {dir}");
    }
    if let Some(summary) = context.summary.filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\n### Previous Conversation Summary\n");
        prompt.push_str(summary.trim_end());
        prompt.push('\n');
    }

    prompt
}
