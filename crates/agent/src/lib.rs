//! The agent loop of llmcode.
//!
//! One user turn runs as a **stream → parse → execute** cycle:
//!
//! 1. **Stream** a response for the full message sequence, splitting
//!    `<think>` spans from visible text as tokens arrive
//! 2. **Parse** tool calls out of the finished text
//! 3. **Execute** each call, routing side effects through the
//!    confirmation gate, and append the results as one user turn
//!
//! The cycle repeats until the model answers without tool calls, the user
//! interrupts, or the iteration budget runs out. With supervisor mode on,
//! a turn can instead be planned and reviewed by a stronger model while
//! this loop does the work.

pub mod compaction;
pub mod confirm;
pub mod interrupt;
pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod stream_event;
pub mod stream_reader;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compaction::compact_history;
pub use confirm::{ConfirmRequest, Confirmer, FixedAnswer};
pub use interrupt::{CtrlC, InterruptSource, NoInterrupt};
pub use loop_runner::{AgentLoop, ChatOutcome, ChatStatus, format_tool_results};
pub use parser::{ToolCallParser, parse_tool_calls};
pub use prompt::{PromptContext, system_prompt};
pub use stream_event::{AgentEvent, EventSink, NoopSink};
pub use stream_reader::{StreamOutcome, StreamReader};
pub use supervisor::SupervisorMode;
