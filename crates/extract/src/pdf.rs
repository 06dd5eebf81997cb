use std::path::Path;

use crate::error::ExtractError;

/// Extract the text layer of a PDF held in memory.
///
/// Runs synchronously; callers move it onto the blocking pool.
pub(crate) fn extract_text(path: &Path, bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::failed(path, e.to_string()))
}
