//! Application state shared across handlers.

use bimgate_core::config::AppConfig;
use bimgate_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
///
/// Everything here is read-only after startup; requests share the storage
/// client and configuration without any cross-request mutable state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Logs a warning for every setting that will fail requests at
    /// runtime (missing bucket, missing update key).
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        for warning in config.warnings() {
            tracing::warn!("Configuration warning: {}", warning);
        }

        Self {
            config: Arc::new(config),
            storage,
        }
    }
}
