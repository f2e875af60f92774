//! Object storage abstraction and backends for bimgate.
//!
//! This crate provides:
//! - A read-only object store trait: bucket listing and streaming reads
//! - Backends: S3-compatible and in-memory (development/tests)

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{memory::MemoryStore, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, ObjectStore};

use bimgate_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Memory { .. } => Ok(Arc::new(MemoryStore::new())),
        StorageConfig::S3 {
            bucket: _,
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                endpoint.clone(),
                region.clone(),
                access_key_id.clone().unwrap_or_default(),
                secret_access_key.clone().unwrap_or_default(),
                *force_path_style,
            )?;
            Ok(Arc::new(backend))
        }
    }
}
