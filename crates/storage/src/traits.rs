//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bimgate_core::selection::ObjectRecord;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Read-only object store abstraction.
///
/// The bucket is an argument rather than backend state: the gateway
/// resolves it from configuration per request, and a missing bucket is a
/// request-time fault rather than a construction failure.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Enumerate every object in a bucket, in the backend's listing
    /// order. Backends that paginate follow the listing to exhaustion.
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectRecord>>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g.,
    /// "s3", "memory"). Used for logging.
    fn backend_name(&self) -> &'static str;
}
