//! Built-in tools for llmcode.
//!
//! Read-only tools (`list_files`, `read_file`, `search_code`, `git_status`,
//! `git_diff`) run directly. `write_file` and `run_command` only return a
//! proposal; the agent loop performs the side effect through
//! [`write_file::commit`] or [`run_command::run_confirmed`] once the user
//! has agreed.

mod args;

pub mod ask_supervisor;
pub mod diff;
pub mod git;
pub mod list_files;
pub mod read_file;
pub mod run_command;
pub mod search_code;
pub mod write_file;

use llmcode_core::supervisor::Supervisor;
use llmcode_core::tool::ToolRegistry;
use std::sync::Arc;

pub use diff::{ChangeKind, ChangedLine, DiffSpan, LineDiff, SpanTag};

/// Knobs for [`default_registry`].
#[derive(Clone, Default)]
pub struct RegistryOptions {
    /// Default `run_command` timeout; 0 means the built-in default.
    pub shell_timeout_secs: u64,

    /// When set, `ask_supervisor` is registered.
    pub supervisor: Option<Arc<dyn Supervisor>>,
}

/// Create the registry with every built-in tool, in the order the system
/// prompt advertises them.
pub fn default_registry(options: RegistryOptions) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(list_files::ListFilesTool));
    registry.register(Box::new(read_file::ReadFileTool));
    registry.register(Box::new(search_code::SearchCodeTool));
    registry.register(Box::new(write_file::WriteFileTool));
    registry.register(Box::new(git::GitStatusTool));
    registry.register(Box::new(git::GitDiffTool));

    let timeout = match options.shell_timeout_secs {
        0 => run_command::DEFAULT_TIMEOUT_SECS,
        secs => secs,
    };
    registry.register(Box::new(run_command::RunCommandTool::new(timeout)));

    if let Some(supervisor) = options.supervisor {
        registry.register(Box::new(ask_supervisor::AskSupervisorTool::new(supervisor)));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmcode_core::tool::{ToolCall, ToolOutcome};
    use serde_json::json;

    #[test]
    fn registry_has_builtin_tools_in_order() {
        let registry = default_registry(RegistryOptions::default());
        assert_eq!(
            registry.names(),
            vec![
                "list_files",
                "read_file",
                "search_code",
                "write_file",
                "git_status",
                "git_diff",
                "run_command",
            ]
        );
        assert!(registry.requires_confirmation("write_file"));
        assert!(registry.requires_confirmation("run_command"));
        assert!(!registry.requires_confirmation("read_file"));
        assert!(registry.get("ask_supervisor").is_none());
    }

    #[tokio::test]
    async fn missing_file_error_through_registry() {
        let registry = default_registry(RegistryOptions::default());
        let call = ToolCall::new("read_file", json!({"path": "/nonexistent/x.py"}));
        assert_eq!(
            registry.execute(&call).await,
            ToolOutcome::error("File not found: /nonexistent/x.py")
        );
    }

    #[tokio::test]
    async fn unexpected_argument_rejected_before_handler() {
        let registry = default_registry(RegistryOptions::default());
        let call = ToolCall::new("list_files", json!({"path": ".", "colour": "red"}));
        let outcome = registry.execute(&call).await;
        assert!(matches!(outcome, ToolOutcome::Error(ref m) if m.contains("unexpected argument 'colour'")));
    }
}
