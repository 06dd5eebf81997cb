use std::path::PathBuf;

use thiserror::Error;

/// Boxed underlying cause of an extraction failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while extracting content from a file.
///
/// None of these are retried: the file is skipped until the next filesystem
/// event for the same path.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extension is not one the pipeline handles. The file was not read.
    #[error("unsupported file type: {}", .0.display())]
    UnsupportedType(PathBuf),

    /// The bytes of an image file did not sniff as a supported image format.
    #[error("unsupported image format: {}", .0.display())]
    UnsupportedImageFormat(PathBuf),

    /// The file could be read but not decoded (corrupt PDF or document).
    #[error("failed to extract content from {}: {source}", path.display())]
    ExtractionFailed {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub(crate) fn failed(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::ExtractionFailed {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Returns `true` when the file was rejected for its type rather than
    /// for its content.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType(_) | Self::UnsupportedImageFormat(_)
        )
    }
}
