//! Credential gate and request tracing middleware.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the caller's shared update key.
pub const UPDATE_KEY_HEADER: &str = "x-deepdeepbim-key";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and filtered
    /// to printable ASCII for log safety.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash a key for comparison. Comparing digests keeps the check free of
/// length-dependent early exits.
fn hash_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Validate a caller-supplied key against the configured update key.
///
/// Errors distinguish caller faults from server faults:
/// - absent/empty header: `MissingCredential`
/// - update key not configured: `Config` (server fault)
/// - mismatch: `InvalidCredential`
pub fn validate_update_key(provided: Option<&str>, configured: Option<&str>) -> Result<(), ApiError> {
    let provided = match provided {
        Some(value) if !value.is_empty() => value,
        _ => return Err(ApiError::MissingCredential),
    };

    let configured = match configured {
        Some(value) if !value.is_empty() => value,
        _ => {
            return Err(ApiError::Config(
                "auth.update_key is not configured".to_string(),
            ));
        }
    };

    if hash_key(provided) != hash_key(configured) {
        return Err(ApiError::InvalidCredential);
    }

    Ok(())
}

/// Middleware guarding the update route: rejects requests without a valid
/// update key and wraps the handler in a trace-ID span.
pub async fn require_update_key(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let provided = req
        .headers()
        .get(UPDATE_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = validate_update_key(provided, state.config.auth.update_key.as_deref()) {
        tracing::warn!(trace_id = %trace_id_str, error = %e, "update request rejected");
        return Err(e);
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}
