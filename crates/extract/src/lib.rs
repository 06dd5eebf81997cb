//! Content extraction for the filekeep intake pipeline.
//!
//! Dispatch is by file extension only. Text-bearing formats (`.txt`, `.pdf`,
//! `.docx`) are decoded to a character stream and capped; images are sniffed
//! from their bytes and returned base64-encoded with the detected MIME type.

mod docx;
pub mod error;
pub mod extractor;
mod pdf;
mod raster;
mod text;

pub use error::ExtractError;
pub use extractor::{ContentExtractor, ExtractedContent, DEFAULT_CHAR_LIMIT, TRUNCATION_MARKER};
