//! HTTP gateway for DeepDeepBim Revit add-in updates.
//!
//! This crate provides the HTTP surface:
//! - Update endpoint that streams a zip archive of add-in files
//! - Shared-key credential gate
//! - Health probe and Prometheus metrics

pub mod archive;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
