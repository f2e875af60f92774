//! Archive assembly: selection in, streamed zip response body out.
//!
//! The producer runs as a spawned task writing into one end of a bounded
//! duplex pipe; the other end becomes the HTTP response body. Production
//! is strictly sequential: the next object's fetch does not start until
//! the previous entry is closed, and pacing comes from the pipe capacity
//! (consumer-driven).

use crate::archive::zip::ZipStreamWriter;
use crate::metrics;
use axum::body::Body;
use bimgate_core::selection::{Selection, entry_name};
use bimgate_storage::ObjectStore;
use futures::StreamExt;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::io::ReaderStream;

/// Duplex pipe capacity between the producer task and the response body.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Build the response body for an update archive. The selection's entries
/// are produced lazily, each object fetched only when its entry is
/// written.
pub fn archive_body(storage: Arc<dyn ObjectStore>, bucket: String, selection: Selection) -> Body {
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

    tokio::spawn(async move {
        match write_entries(ZipStreamWriter::new(writer), storage, &bucket, &selection).await {
            Ok(entries) => {
                metrics::ARCHIVES_STREAMED.inc();
                tracing::debug!(bucket = %bucket, entries, "archive stream complete");
            }
            // Status and headers are long committed once the body is
            // producing; a write error means the response was abandoned.
            Err(e) => tracing::debug!(bucket = %bucket, error = %e, "archive stream aborted"),
        }
    });

    Body::from_stream(ReaderStream::new(reader))
}

/// Write one zip entry per selection member, in selection order.
///
/// Per-entry failure policy: an object whose fetch cannot be opened is
/// skipped before any archive bytes are written; an object whose stream
/// breaks mid-copy has its entry closed out but dropped from the central
/// directory. Neither aborts the archive. Returns the number of entries
/// recorded in the central directory.
pub(crate) async fn write_entries<W: AsyncWrite + Unpin>(
    mut zip: ZipStreamWriter<W>,
    storage: Arc<dyn ObjectStore>,
    bucket: &str,
    selection: &Selection,
) -> io::Result<usize> {
    for record in selection.iter() {
        let name = entry_name(&record.key);
        if name.is_empty() {
            tracing::debug!(key = %record.key, "object key has no base filename, skipped");
            continue;
        }

        // Open the object before starting the entry so a failed fetch
        // leaves no trace in the archive.
        let mut stream = match storage.get_stream(bucket, &record.key).await {
            Ok(stream) => stream,
            Err(e) => {
                metrics::ARCHIVE_ENTRY_FAILURES.inc();
                tracing::warn!(key = %record.key, error = %e, "failed to open object, entry skipped");
                continue;
            }
        };

        zip.start_entry(name).await?;

        let mut failed = false;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => zip.write_data(&bytes).await?,
                Err(e) => {
                    tracing::warn!(
                        key = %record.key,
                        error = %e,
                        "object transfer failed mid-entry, entry dropped from directory"
                    );
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            metrics::ARCHIVE_ENTRY_FAILURES.inc();
            zip.abandon_entry().await?;
        } else {
            metrics::ARCHIVE_ENTRIES.inc();
            zip.finish_entry().await?;
        }
    }

    let entries = zip.entry_count();
    zip.finish().await?;
    Ok(entries)
}
