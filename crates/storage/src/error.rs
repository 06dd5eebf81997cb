use std::path::PathBuf;

use filekeep_core::BackendKind;
use filekeep_index::IndexError;
use thiserror::Error;
use uuid::Uuid;

/// Errors from storage backends, the account store and the upload service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The owner has no complete credentials for the backend.
    #[error("credentials for {0} are not configured")]
    CredentialsMissing(BackendKind),

    /// No account is linked to the presented agent token.
    #[error("no account is linked to this agent token")]
    UnknownAgent,

    /// No stored file has the given id.
    #[error("file not found: {0}")]
    NotFound(Uuid),

    /// The stored file belongs to another owner.
    #[error("file {0} belongs to another owner")]
    NotOwner(Uuid),

    /// The remote service rejected the request.
    #[error("remote storage error: {0}")]
    Remote(String),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote service answered HTTP 429.
    #[error("rate limited by remote storage")]
    RateLimited,

    /// The backend was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The local file could not be read.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file index failed.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl StorageError {
    /// Returns `true` if the same request could succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::RateLimited)
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Remote(format!("unexpected response body: {err}"))
        } else {
            Self::Connection(err.to_string())
        }
    }
}
