use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::hash::ContentHash;

/// The interchangeable remote storage services a file can be uploaded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Cloudinary,
    Dropbox,
    Mega,
}

impl BackendKind {
    pub const ALL: [Self; 3] = [Self::Cloudinary, Self::Dropbox, Self::Mega];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloudinary => "cloudinary",
            Self::Dropbox => "dropbox",
            Self::Mega => "mega",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloudinary" => Ok(Self::Cloudinary),
            "dropbox" => Ok(Self::Dropbox),
            "mega" => Ok(Self::Mega),
            other => Err(CoreError::UnknownBackend(other.to_owned())),
        }
    }
}

/// A file that has been uploaded to a storage backend.
///
/// `(owner_id, content_hash)` is unique across all records: identical bytes
/// are never stored twice for the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub owner_id: String,
    /// Logical name (the original filename), used to find and replace the
    /// previous version on the same backend.
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub backend: BackendKind,
    /// Durable retrieval URL.
    pub url: String,
    /// Backend-specific handle needed to delete the remote object.
    pub remote_id: String,
    pub content_hash: ContentHash,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    /// Returns `true` if this record names `name` on `backend` for `owner_id`.
    pub fn is_version_of(&self, owner_id: &str, name: &str, backend: BackendKind) -> bool {
        self.owner_id == owner_id && self.name == name && self.backend == backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_roundtrips_through_str() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!(" Dropbox ".parse::<BackendKind>().unwrap(), BackendKind::Dropbox);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = "gdrive".parse::<BackendKind>().unwrap_err();
        assert_eq!(err, CoreError::UnknownBackend("gdrive".into()));
    }

    #[test]
    fn default_backend_is_cloudinary() {
        assert_eq!(BackendKind::default(), BackendKind::Cloudinary);
    }

    #[test]
    fn backend_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BackendKind::Mega).unwrap();
        assert_eq!(json, "\"mega\"");
    }
}
