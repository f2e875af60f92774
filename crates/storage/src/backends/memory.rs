//! In-memory storage backend for development and tests.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore};
use async_trait::async_trait;
use bimgate_core::selection::ObjectRecord;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// Chunk size for streamed reads. Small enough that multi-chunk copy
/// paths are exercised by realistic test fixtures.
const STREAM_CHUNK_SIZE: usize = 1024;

/// In-memory object store.
///
/// Objects are kept per bucket in insertion order, which is also the
/// listing order (mirrors the deterministic listing order the gateway
/// relies on for archive assembly).
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, Vec<(String, Bytes)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object. Replacement keeps the original
    /// listing position.
    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let mut buckets = self.buckets.write().expect("memory store lock poisoned");
        let objects = buckets.entry(bucket.to_string()).or_default();

        match objects.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = data,
            None => objects.push((key.to_string(), data)),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectRecord>> {
        let buckets = self.buckets.read().expect("memory store lock poisoned");
        let records = buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(key, data)| ObjectRecord::new(key.clone(), data.len() as u64))
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let data = {
            let buckets = self.buckets.read().expect("memory store lock poisoned");
            buckets
                .get(bucket)
                .and_then(|objects| objects.iter().find(|(k, _)| k == key))
                .map(|(_, data)| data.clone())
        };

        let data = data.ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let chunks: Vec<StorageResult<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|start| {
                let end = (start + STREAM_CHUNK_SIZE).min(data.len());
                Ok(data.slice(start..end))
            })
            .collect();

        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
