//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// When enabled, keep the endpoint network-restricted to authorized
    /// scraper IPs at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Storage backend configuration.
///
/// The bucket name is optional in both variants: the original deployment
/// resolves it per request, so a missing bucket is a request-time fault
/// (HTTP 500), not a startup failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (development and tests).
    Memory {
        /// Bucket name served by the store.
        bucket: Option<String>,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: Option<String>,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// AWS access key ID.
        access_key_id: Option<String>,
        /// AWS secret access key.
        /// WARNING: Prefer env vars over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (e.g., `endpoint/bucket/key` instead of
        /// `bucket.endpoint/key`). Required for MinIO and some
        /// S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory { bucket: None }
    }
}

impl StorageConfig {
    /// Get the configured bucket name, if any.
    pub fn bucket(&self) -> Option<&str> {
        match self {
            Self::Memory { bucket } | Self::S3 { bucket, .. } => bucket.as_deref(),
        }
    }

    /// Validate storage configuration invariants.
    ///
    /// S3 credentials are startup-fatal: the client is built once at
    /// process start and cannot sign requests without them.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Memory { .. } => Ok(()),
            Self::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => {
                if access_key_id.as_deref().is_none_or(str::is_empty) {
                    return Err("s3 config requires access_key_id".to_string());
                }
                if secret_access_key.as_deref().is_none_or(str::is_empty) {
                    return Err("s3 config requires secret_access_key".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Caller authentication configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in the X-DeepDeepBim-Key request header.
    /// Unset means every update request fails with a configuration error.
    pub update_key: Option<String>,
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Caller authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Collect warnings for settings that will fail requests at runtime.
    /// These are not startup-fatal: the affected requests answer 500.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.auth.update_key.as_deref().is_none_or(str::is_empty) {
            warnings.push(
                "auth.update_key is not set; all update requests will fail with 500".to_string(),
            );
        }
        if self.storage.bucket().is_none_or(str::is_empty) {
            warnings.push(
                "storage bucket is not set; all update requests will fail with 500".to_string(),
            );
        }

        warnings
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses in-memory storage and a dummy update key.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Memory {
                bucket: Some("test-updates".to_string()),
            },
            auth: AuthConfig {
                update_key: Some("test-update-key".to_string()),
            },
        }
    }
}
