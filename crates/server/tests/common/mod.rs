//! Shared test utilities.

pub mod zip;

use async_trait::async_trait;
use bimgate_core::config::AppConfig;
use bimgate_core::selection::ObjectRecord;
use bimgate_server::{AppState, create_router};
use bimgate_storage::traits::ByteStream;
use bimgate_storage::{MemoryStore, ObjectStore, StorageResult};
use std::sync::Arc;

/// A test server wrapper with direct access to the seeded store.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub store: Arc<MemoryStore>,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with the default testing config
    /// (in-memory bucket "test-updates", update key "test-update-key").
    pub fn new() -> Self {
        Self::with_config(AppConfig::for_testing())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage: Arc<dyn ObjectStore> = store.clone();
        let state = AppState::new(config, storage);

        Self {
            router: create_router(state),
            store,
        }
    }

    /// Create a test server over an arbitrary storage backend.
    pub fn with_storage(config: AppConfig, storage: Arc<dyn ObjectStore>) -> axum::Router {
        create_router(AppState::new(config, storage))
    }

    /// Seed an object into the testing bucket.
    pub fn put(&self, key: &str, data: &[u8]) {
        self.store.put("test-updates", key, data.to_vec());
    }
}

/// Store whose listing advertises objects that cannot be fetched,
/// emulating a bucket that changed between listing and streaming.
#[allow(dead_code)]
pub struct GhostStore {
    pub inner: MemoryStore,
    pub ghosts: Vec<ObjectRecord>,
}

#[async_trait]
impl ObjectStore for GhostStore {
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectRecord>> {
        let mut records = self.inner.list_objects(bucket).await?;
        records.extend(self.ghosts.iter().cloned());
        Ok(records)
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(bucket, key).await
    }

    fn backend_name(&self) -> &'static str {
        "ghost"
    }
}
