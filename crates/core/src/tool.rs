//! Tool trait: the abstraction over locally executed operations.
//!
//! Tools read the project, search it, inspect git, and propose changes.
//! A tool never reports failure by returning `Err` to the agent loop: the
//! registry folds every handler error into [`ToolOutcome::Error`] so the
//! model can see it and react.
//!
//! Side-effecting tools follow a propose/confirm split. Their handler only
//! validates and returns [`ToolOutcome::NeedsConfirmation`]; the loop alone
//! performs the mutation after a human says yes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::ToolError;

/// A structured request, parsed out of model text, to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub tool: String,

    /// Arguments, keyed by parameter name
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool: tool.into(),
            args,
        }
    }

    /// String value of an argument, if present.
    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }
}

/// Preview data for an action that needs a human checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    WriteFile {
        path: String,
        exists: bool,
        old_content: String,
        new_content: String,
    },
    RunCommand {
        command: String,
        cwd: String,
        timeout_secs: u64,
    },
}

impl Proposal {
    pub fn action(&self) -> &'static str {
        match self {
            Proposal::WriteFile { .. } => "write_file",
            Proposal::RunCommand { .. } => "run_command",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Proposal::WriteFile {
                path,
                exists,
                old_content,
                new_content,
            } => json!({
                "action": self.action(),
                "path": path,
                "exists": exists,
                "old_content": old_content,
                "new_content": new_content,
                "requires_confirmation": true,
            }),
            Proposal::RunCommand {
                command,
                cwd,
                timeout_secs,
            } => json!({
                "action": self.action(),
                "command": command,
                "path": cwd,
                "timeout": timeout_secs,
                "requires_confirmation": true,
            }),
        }
    }
}

/// What one tool invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Normal payload.
    Ok(Value),
    /// Failure, surfaced to the model as `{"error": message}`.
    Error(String),
    /// The human declined, surfaced as `{"cancelled": true, "message": ...}`.
    Cancelled(String),
    /// A side effect awaiting confirmation.
    NeedsConfirmation(Proposal),
}

impl ToolOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// The cancellation recorded when a confirmation is declined.
    pub fn user_cancelled() -> Self {
        Self::Cancelled("User cancelled".into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Ok(payload) => payload.clone(),
            Self::Error(message) => json!({ "error": message }),
            Self::Cancelled(message) => json!({ "cancelled": true, "message": message }),
            Self::NeedsConfirmation(proposal) => proposal.to_json(),
        }
    }
}

/// The outcome of one call, labelled with the tool that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn new(tool: impl Into<String>, outcome: ToolOutcome) -> Self {
        Self {
            tool: tool.into(),
            outcome,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "tool": self.tool, "result": self.outcome.to_json() })
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model uses to call this tool (e.g. "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown in the system prompt).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters. The registry enforces
    /// its `required` list and rejects names missing from `properties`.
    fn parameters_schema(&self) -> Value;

    /// Example argument objects advertised to the model.
    fn examples(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Whether the tool's side effect must pass the confirmation gate.
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// Execute the tool. `arguments` is always a JSON object.
    async fn execute(&self, arguments: Value) -> std::result::Result<ToolOutcome, ToolError>;
}

/// A registry of available tools, kept in registration order so the
/// system prompt lists them deterministically.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tools, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.as_ref()))
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether the named tool is confirmation-gated.
    pub fn requires_confirmation(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.requires_confirmation())
    }

    /// Execute a tool call. Never fails: unknown tools, contract violations
    /// and handler errors all come back as [`ToolOutcome::Error`]. A gated
    /// tool must answer with a proposal; a plain payload from it is refused.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.get(&call.tool) else {
            warn!(tool = %call.tool, "Model called an unknown tool");
            return ToolOutcome::Error(ToolError::NotFound(call.tool.clone()).to_string());
        };

        if let Err(e) = check_contract(&call.tool, &tool.parameters_schema(), &call.args) {
            debug!(tool = %call.tool, error = %e, "Tool arguments rejected");
            return ToolOutcome::Error(e.to_string());
        }

        match tool.execute(Value::Object(call.args.clone())).await {
            Ok(ToolOutcome::Ok(_)) if tool.requires_confirmation() => {
                warn!(tool = %call.tool, "Gated tool acted without a proposal");
                ToolOutcome::Error(
                    ToolError::Blocked(format!("{} ran without confirmation", call.tool)).to_string(),
                )
            }
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(tool = %call.tool, error = %e, "Tool returned an error");
                ToolOutcome::Error(e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `args` against the `required` and `properties` of a JSON schema.
fn check_contract(tool: &str, schema: &Value, args: &Map<String, Value>) -> Result<(), ToolError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(name) {
                return Err(ToolError::InvalidArguments(format!(
                    "{tool}() missing required argument '{name}'"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object)
        && let Some(unknown) = args.keys().find(|k| !properties.contains_key(*k))
    {
        return Err(ToolError::InvalidArguments(format!(
            "{tool}() got an unexpected argument '{unknown}'"
        )));
    }

    Ok(())
}
