//! Terminal front-end: rendering agent events, line input and the
//! `[y/N]` confirmation prompt.

use async_trait::async_trait;
use crossterm::style::Stylize;
use llmcode_agent::{AgentEvent, ConfirmRequest, Confirmer, EventSink};
use llmcode_tools::{ChangeKind, LineDiff};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Changed lines shown before the preview is cut.
const MAX_DIFF_LINES: usize = 60;

/// Line reader over stdin, shared by the chat prompt and confirmations.
pub struct Input {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Input {
    pub fn stdin() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

/// Prints agent events as they happen.
#[derive(Default)]
pub struct TerminalSink;

impl EventSink for TerminalSink {
    fn emit(&self, event: AgentEvent) {
        let mut out = std::io::stdout();
        match event {
            AgentEvent::Text { content } => {
                let _ = write!(out, "{content}");
            }
            AgentEvent::Thinking { content } => {
                let _ = write!(out, "{}", content.dim());
            }
            AgentEvent::ToolCall { name, args } => {
                let _ = writeln!(out, "\n{} {} {}", "▸".cyan(), name.cyan().bold(), args.to_string().dim());
            }
            AgentEvent::ToolResult { name, success, summary } => {
                let mark = if success { "✓".green() } else { "✗".red() };
                let _ = writeln!(out, "{mark} {name}: {}", summary.dim());
            }
            AgentEvent::CommandOutput { output } => {
                for line in output.lines() {
                    let _ = writeln!(out, "  {}", line.dim());
                }
            }
            AgentEvent::Notice { message } => {
                let _ = writeln!(out, "\n{}", message.dim());
            }
            AgentEvent::Error { message } => {
                let _ = writeln!(out, "\n{} {message}", "Error:".red().bold());
            }
            AgentEvent::Stopped => {
                let _ = writeln!(out, "\n{}", "(Stopped)".yellow());
            }
            AgentEvent::MaxIterations { iterations } => {
                let _ = writeln!(out, "\n{}", format!("Max iterations reached ({iterations})").yellow());
            }
            AgentEvent::SupervisorPlanning { reason } => {
                let _ = writeln!(out, "\n{} Planning... {}", "Supervisor".magenta().bold(), reason.dim());
            }
            AgentEvent::SupervisorPlan { plan, steps } => {
                let _ = writeln!(out, "{} {plan}", "Plan:".magenta());
                for (i, step) in steps.iter().enumerate() {
                    let _ = writeln!(out, "  {}", format!("{}. {step}", i + 1).dim());
                }
            }
            AgentEvent::LocalExecuting { continuation } => {
                let label = if continuation { "Continuing..." } else { "Executing..." };
                let _ = writeln!(out, "\n{} {label}", "Local model".green().bold());
            }
            AgentEvent::SupervisorReviewing => {
                let _ = writeln!(out, "\n{} Reviewing...", "Supervisor".magenta().bold());
            }
            AgentEvent::SupervisorReview { status, feedback } => {
                let _ = writeln!(out, "{} {status}", "Status:".magenta());
                let _ = writeln!(out, "{} {feedback}", "Feedback:".magenta());
            }
            AgentEvent::Done { usage, .. } => {
                let _ = writeln!(out);
                if let Some(usage) = usage {
                    let _ = writeln!(out, "{}", format!("tokens: {}", usage.total_tokens).dim());
                }
            }
        }
        let _ = out.flush();
    }
}

/// Render a diff preview: `-` lines red, `+` lines green, with line numbers.
pub fn render_diff(diff: &LineDiff) -> Vec<String> {
    let lines = diff.changed_lines();
    let mut rendered: Vec<String> = lines
        .iter()
        .take(MAX_DIFF_LINES)
        .map(|line| match line.kind {
            ChangeKind::Removed => format!("{:>5} - {}", line.number, line.text).red().to_string(),
            ChangeKind::Added => format!("{:>5} + {}", line.number, line.text).green().to_string(),
        })
        .collect();
    if lines.len() > MAX_DIFF_LINES {
        rendered.push(format!("... {} more changed lines", lines.len() - MAX_DIFF_LINES).dim().to_string());
    }
    rendered
}

/// Asks on the terminal; anything but `y`/`yes` is a no.
pub struct TerminalConfirmer {
    input: Arc<Input>,
}

impl TerminalConfirmer {
    pub fn new(input: Arc<Input>) -> Self {
        Self { input }
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, request: ConfirmRequest<'_>) -> bool {
        let question = match request {
            ConfirmRequest::WriteFile { path, exists, diff } => {
                let verb = if exists { "Modify" } else { "Create" };
                println!("\n{} {path}", verb.yellow().bold());
                if diff.has_changes() {
                    let (added, removed) = diff.stats();
                    println!("{}", format!("-{removed} +{added}").dim());
                    for line in render_diff(diff) {
                        println!("{line}");
                    }
                } else {
                    println!("{}", "(no changes)".dim());
                }
                "Write this file?"
            }
            ConfirmRequest::RunCommand {
                command,
                cwd,
                timeout_secs,
            } => {
                println!("\n{} {}", "Run".yellow().bold(), command.bold());
                println!("{}", format!("in {cwd}, timeout {timeout_secs}s").dim());
                "Run this command?"
            }
            ConfirmRequest::Supervisor { reason } => {
                println!("\n{} {reason}", "Supervisor suggested:".magenta().bold());
                "Hand this request to the supervisor?"
            }
        };

        let answer = self.input.read_line(&format!("{question} [y/N] ")).await;
        answer.is_some_and(|a| is_yes(&a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn diff_preview_numbers_lines() {
        let diff = LineDiff::compute("a\nb\nc\n", "a\nB\nc\n");
        let rendered = render_diff(&diff);
        assert_eq!(rendered.len(), 2);
        assert!(rendered[0].contains("    2 - b"));
        assert!(rendered[1].contains("    2 + B"));
    }

    #[test]
    fn long_diffs_are_cut() {
        let new: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let diff = LineDiff::compute("", &new);
        let rendered = render_diff(&diff);
        assert_eq!(rendered.len(), MAX_DIFF_LINES + 1);
        assert!(rendered[MAX_DIFF_LINES].contains("40 more changed lines"));
    }
}
