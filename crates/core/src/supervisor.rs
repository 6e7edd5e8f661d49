//! Supervisor trait: a second, usually stronger, model consulted for
//! planning and review.
//!
//! Backends never return `Err`. A failure is a string starting with
//! [`SUPERVISOR_ERROR_MARKER`], so callers check the text the same way
//! whichever backend answered.

use async_trait::async_trait;

/// Prefix of every failure string a supervisor backend returns.
pub const SUPERVISOR_ERROR_MARKER: &str = "[Supervisor Error]";

#[async_trait]
pub trait Supervisor: Send + Sync {
    /// A human-readable name for this backend (e.g. "claude-cli").
    fn name(&self) -> &str;

    /// Send one prompt, optionally with a system prompt, and return the text.
    async fn chat(&self, prompt: &str, system: Option<&str>) -> String;
}

/// Build the failure string for a backend.
pub fn supervisor_error(detail: impl std::fmt::Display) -> String {
    format!("{SUPERVISOR_ERROR_MARKER} {detail}")
}

/// Whether a supervisor reply is a failure rather than an answer.
pub fn is_supervisor_error(reply: &str) -> bool {
    reply.trim_start().starts_with(SUPERVISOR_ERROR_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_marker_roundtrip() {
        let reply = supervisor_error("HTTP 401: invalid x-api-key");
        assert!(reply.starts_with("[Supervisor Error] HTTP 401"));
        assert!(is_supervisor_error(&reply));
        assert!(!is_supervisor_error("Here is the plan"));
    }
}
