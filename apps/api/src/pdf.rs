//! Text extraction from uploaded resume PDFs.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::scoring::extractor::ExtractionError;

/// Extracts plain text from a PDF held in memory.
///
/// Runs on the blocking pool. `pdf-extract` can panic on malformed files; a panic
/// surfaces here as `ExtractionError::Unreadable` instead of tearing down the request.
/// An empty result is returned as-is; stage 1 rejects it before any model call.
pub async fn extract_text(document: Bytes) -> Result<String, ExtractionError> {
    if document.is_empty() {
        return Err(ExtractionError::Unreadable("uploaded file is empty".to_string()));
    }

    let size = document.len();
    let result = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
        .await
        .map_err(|e| {
            warn!("PDF extraction task aborted: {e}");
            ExtractionError::Unreadable("the PDF could not be parsed".to_string())
        })?;

    let text = result.map_err(|e| {
        warn!("PDF extraction failed: {e}");
        ExtractionError::Unreadable(format!("the PDF could not be parsed: {e}"))
    })?;

    debug!("Extracted {} chars from a {} byte PDF", text.len(), size);
    Ok(text)
}
