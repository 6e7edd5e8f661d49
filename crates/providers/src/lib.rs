//! Transports for llmcode.
//!
//! - [`InferenceServerClient`] streams chat completions from the llmcode
//!   inference server over SSE and implements [`llmcode_core::Provider`].
//! - [`supervisor`] holds the two [`llmcode_core::Supervisor`] backends.

pub mod server;
pub mod sse;
pub mod supervisor;

pub use server::{InferenceServerClient, RetryPolicy};
pub use sse::SseDecoder;
pub use supervisor::{ApiSupervisor, CliSupervisor};
