use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// File extensions the intake pipeline reacts to, lower-case and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "pdf", "docx", "jpg", "jpeg", "png"];

/// Kind of file, decided purely by extension.
///
/// The kind selects both the extraction strategy and the classification
/// prompt. The three image extensions collapse into [`FileKind::Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Plain UTF-8 text (`.txt`).
    Text,
    /// PDF document (`.pdf`).
    Pdf,
    /// Word processing document (`.docx`).
    Document,
    /// Raster image (`.jpg`, `.jpeg`, `.png`).
    Image,
}

impl FileKind {
    /// Map a bare extension (no leading dot, any case) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Document),
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            _ => None,
        }
    }

    /// Map a path to a kind using its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns `true` if the path has a supported extension.
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_some()
    }

    /// Returns `true` for kinds whose content is sent as text.
    pub fn is_text_bearing(self) -> bool {
        !matches!(self, Self::Image)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
