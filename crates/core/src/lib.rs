//! # llmcode core
//!
//! Domain types, traits, and error definitions for the llmcode coding
//! assistant. Every collaborator of the agent loop is a trait here; the
//! implementations live in their own crates:
//!
//! - [`Provider`] - the streaming inference transport (`llmcode-providers`)
//! - [`Supervisor`] - the planning/review model (`llmcode-providers`)
//! - [`Tool`] - a locally executed operation (`llmcode-tools`)
//! - [`HistoryStore`] - persisted conversation state (`llmcode-memory`)

pub mod error;
pub mod history;
pub mod message;
pub mod provider;
pub mod supervisor;
pub mod text;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{HistoryError, ProviderError, ToolError};
pub use history::HistoryStore;
pub use message::{Message, Role, TOOL_RESULTS_MARKER};
pub use provider::{ChatRequest, EventStream, ModelInfo, Provider, ServerHealth, StreamEvent, Usage};
pub use supervisor::{SUPERVISOR_ERROR_MARKER, Supervisor};
pub use tool::{Proposal, Tool, ToolCall, ToolOutcome, ToolRegistry, ToolResult};
