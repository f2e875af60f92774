//! S3-compatible storage backend using AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bimgate_core::selection::ObjectRecord;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// S3-compatible object store using AWS SDK.
///
/// Credentials are explicit and mandatory: the deployment contract feeds
/// them through configuration, and a client that cannot sign requests is
/// a startup failure rather than a request-time surprise.
pub struct S3Backend {
    client: Client,
    /// Stored endpoint (normalized) for logging and identity.
    endpoint: String,
    /// Stored region for logging and identity.
    region: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`)
    ///   instead of virtual-hosted style (`bucket.endpoint/key`). Required
    ///   for MinIO and some S3-compatible services; AWS S3 requires
    ///   virtual-hosted style (false).
    pub fn new(
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: String,
        secret_access_key: String,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return Err(StorageError::Config(
                "s3 backend requires both access_key_id and secret_access_key".to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None, // session token
            None, // expiration
            "bimgate-config",
        );

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()))
            .credentials_provider(credentials);

        let normalized_endpoint = endpoint.map(|endpoint_url| {
            // Handle bare host:port endpoints (e.g., "minio:9000") by prepending http://
            let endpoint_lower = endpoint_url.to_lowercase();
            if endpoint_lower.starts_with("http://") || endpoint_lower.starts_with("https://") {
                endpoint_url
            } else {
                format!("http://{}", endpoint_url)
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);

            // For explicit HTTP endpoints (e.g. local MinIO), use an HTTP-only client
            // so SDK initialization doesn't depend on native trust roots.
            if endpoint_url.to_ascii_lowercase().starts_with("http://") {
                s3_config_builder =
                    s3_config_builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        let stored_endpoint = match normalized_endpoint {
            Some(url) => url,
            None => format!("s3.{}.amazonaws.com", resolved_region),
        };

        Ok(Self {
            client,
            endpoint: stored_endpoint,
            region: resolved_region,
        })
    }

    /// The resolved endpoint this backend talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The resolved region this backend signs for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Convert an AWS SDK error to StorageError, mapping NotFound appropriately.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            let raw = service_err.raw();
            if raw.status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        StorageError::S3(Box::new(err))
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectRecord>> {
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        // Follow continuation tokens until the listing is exhausted, so
        // buckets larger than one page are fully covered.
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, bucket))?;

            for obj in output.contents() {
                if let Some(obj_key) = obj.key() {
                    results.push(ObjectRecord::new(
                        obj_key,
                        obj.size().unwrap_or(0).max(0) as u64,
                    ));
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        // Convert AWS ByteStream to AsyncRead, then wrap with ReaderStream for true streaming
        let async_read = output.body.into_async_read();
        let reader_stream = ReaderStream::new(async_read);

        let stream = reader_stream.map(|result| result.map_err(StorageError::Io));

        Ok(Box::pin(stream))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
