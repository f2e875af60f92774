//! Domain types and configuration for the bimgate update gateway.

pub mod config;
pub mod selection;

pub use config::{AppConfig, AuthConfig, ServerConfig, StorageConfig};
pub use selection::{ObjectRecord, Selection, entry_name, matches_update_suffix};
