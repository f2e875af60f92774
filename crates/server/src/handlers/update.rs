//! Add-in update endpoint.

use crate::archive::archive_body;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::Response;
use bimgate_core::selection::Selection;

/// Filename advertised in the Content-Disposition header.
const ARCHIVE_FILENAME: &str = "RevitAddinUpdate.zip";

/// Response header reporting the selection size. Counts every selected
/// object, including ones later skipped for an empty entry name.
const FILE_COUNT_HEADER: &str = "x-file-count";

/// Response header reporting the sum of declared object sizes at listing
/// time. Not re-validated against the bytes actually transferred.
const TOTAL_SIZE_HEADER: &str = "x-total-uncompressed-size";

/// POST /deepdeepbim/api/update-revit-addin
///
/// Lists the configured bucket, selects `.json`/`.dll` objects, and
/// streams them back as a single zip archive. Authentication happens in
/// the route middleware; by the time this handler runs the caller holds a
/// valid update key.
pub async fn update_revit_addin(State(state): State<AppState>) -> ApiResult<Response> {
    metrics::UPDATE_REQUESTS.inc();

    let bucket = state
        .config
        .storage
        .bucket()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::Config("storage bucket is not configured".to_string()))?
        .to_string();

    let listing = state.storage.list_objects(&bucket).await?;
    let selection = Selection::from_listing(listing);

    if selection.is_empty() {
        return Err(ApiError::NoMatchingFiles);
    }

    let file_count = selection.len() as u64;
    let total_uncompressed = selection.total_size();
    tracing::info!(
        bucket = %bucket,
        file_count,
        total_uncompressed,
        "streaming update archive"
    );

    let body = archive_body(state.storage.clone(), bucket, selection);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{ARCHIVE_FILENAME}\""),
        )
        .header(FILE_COUNT_HEADER, file_count)
        .header(TOTAL_SIZE_HEADER, total_uncompressed)
        .body(body)
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))?;

    Ok(response)
}
