//! Interrupt sources.
//!
//! The loop races each streamed model call against
//! [`InterruptSource::interrupted`]. When it resolves first, the loop
//! cancels that call's token. Dropping the future disarms the listener.

use async_trait::async_trait;

#[async_trait]
pub trait InterruptSource: Send + Sync {
    /// Resolve when the user asks to stop the current response.
    async fn interrupted(&self);
}

/// Never interrupts.
pub struct NoInterrupt;

#[async_trait]
impl InterruptSource for NoInterrupt {
    async fn interrupted(&self) {
        std::future::pending::<()>().await
    }
}

/// Ctrl+C while a response is streaming.
pub struct CtrlC;

#[async_trait]
impl InterruptSource for CtrlC {
    async fn interrupted(&self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl+C; interrupts disabled");
            std::future::pending::<()>().await
        }
    }
}
