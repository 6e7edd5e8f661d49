//! Supervisor backends.
//!
//! Two interchangeable transports implement [`llmcode_core::Supervisor`]:
//!
//! - [`CliSupervisor`] - runs a local command-line tool, prompt on stdin,
//!   JSON envelope with a `result` field on stdout
//! - [`ApiSupervisor`] - calls the remote messages API over HTTPS
//!
//! Both report failures as `[Supervisor Error] ...` strings.

pub mod api;
pub mod cli;

pub use api::ApiSupervisor;
pub use cli::CliSupervisor;

use llmcode_config::{SupervisorBackend, SupervisorConfig};
use llmcode_core::Supervisor;
use std::sync::Arc;
use tracing::info;

/// Build the configured supervisor backend.
///
/// Returns `None` when the API backend is selected but no key is available.
pub fn build_from_config(config: &SupervisorConfig) -> Option<Arc<dyn Supervisor>> {
    match config.backend {
        SupervisorBackend::Cli => {
            info!(command = %config.command, "Using command-line supervisor");
            Some(Arc::new(CliSupervisor::from_config(config)))
        }
        SupervisorBackend::Api => {
            let key = config.api_key.clone()?;
            info!(model = %config.model, "Using API supervisor");
            ApiSupervisor::from_config(config, key)
                .ok()
                .map(|s| Arc::new(s) as Arc<dyn Supervisor>)
        }
    }
}
