use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use filekeep_core::FileKind;
use tracing::{debug, instrument};

use crate::error::ExtractError;
use crate::{docx, pdf, raster, text};

/// Default cap on extracted text, in characters.
pub const DEFAULT_CHAR_LIMIT: usize = 25_000;

/// Appended to text that was cut at the character cap.
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Content ready to be sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    /// Decoded text of a `.txt`, `.pdf` or `.docx` file.
    Text {
        kind: FileKind,
        text: String,
        /// `true` when the text was cut at the cap and carries the marker.
        truncated: bool,
    },
    /// Raw image bytes, base64-encoded, tagged with the sniffed MIME type.
    Image {
        mime_type: String,
        data_base64: String,
    },
}

impl ExtractedContent {
    pub fn kind(&self) -> FileKind {
        match self {
            Self::Text { kind, .. } => *kind,
            Self::Image { .. } => FileKind::Image,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Turns a file on disk into [`ExtractedContent`].
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    char_limit: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor {
    /// Create an extractor with the default 25 000 character cap.
    pub fn new() -> Self {
        Self {
            char_limit: DEFAULT_CHAR_LIMIT,
        }
    }

    /// Set the character cap applied to text-bearing formats.
    #[must_use]
    pub fn with_char_limit(mut self, char_limit: usize) -> Self {
        self.char_limit = char_limit;
        self
    }

    pub fn char_limit(&self) -> usize {
        self.char_limit
    }

    /// Extract the content of `path`.
    ///
    /// Unsupported extensions fail with [`ExtractError::UnsupportedType`]
    /// before the file is opened. PDF and DOCX parsing runs on the blocking
    /// pool.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractError> {
        let kind =
            FileKind::from_path(path).ok_or_else(|| ExtractError::UnsupportedType(path.into()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractError::Io {
                path: path.into(),
                source,
            })?;
        debug!(kind = %kind, bytes = bytes.len(), "read file for extraction");

        let raw = match kind {
            FileKind::Image => return Self::encode_image(path, &bytes),
            FileKind::Text => text::decode(&bytes),
            FileKind::Pdf => parse_blocking(path, bytes, pdf::extract_text).await?,
            FileKind::Document => parse_blocking(path, bytes, docx::extract_text).await?,
        };

        let (text, truncated) = text::truncate(raw, self.char_limit, TRUNCATION_MARKER);
        if truncated {
            debug!(limit = self.char_limit, "extracted text truncated");
        }
        Ok(ExtractedContent::Text {
            kind,
            text,
            truncated,
        })
    }

    fn encode_image(path: &Path, bytes: &[u8]) -> Result<ExtractedContent, ExtractError> {
        let mime_type = raster::sniff_mime(bytes)
            .ok_or_else(|| ExtractError::UnsupportedImageFormat(path.into()))?;
        Ok(ExtractedContent::Image {
            mime_type: mime_type.to_owned(),
            data_base64: STANDARD.encode(bytes),
        })
    }
}

async fn parse_blocking(
    path: &Path,
    bytes: Vec<u8>,
    parse: fn(&Path, &[u8]) -> Result<String, ExtractError>,
) -> Result<String, ExtractError> {
    let owned: PathBuf = path.into();
    tokio::task::spawn_blocking(move || parse(&owned, &bytes))
        .await
        .map_err(|e| ExtractError::failed(path, e))?
}
