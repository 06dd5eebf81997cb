use std::path::{Path, PathBuf};

use async_trait::async_trait;
use filekeep_core::{BackendKind, StoredFile};
use tracing::warn;

use crate::error::StorageError;

/// A local file about to be sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadObject {
    pub owner_id: String,
    /// Logical name: the original filename.
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl UploadObject {
    /// Read the whole file into memory.
    pub async fn read(&self) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))
    }
}

/// Where a backend put an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Durable, directly fetchable retrieval URL.
    pub url: String,
    /// Handle the same backend needs to delete the object again.
    pub remote_id: String,
}

/// Strongly-typed storage backend with native `async fn`.
///
/// Not object-safe; use [`DynStorageBackend`] behind `Arc<dyn ...>`. Every
/// `StorageBackend` implements it through a blanket implementation.
///
/// Backend-specific protocol steps (link negotiation, size declaration,
/// completion waits) stay inside the implementation. Callers only ever see
/// `upload` and `delete`.
pub trait StorageBackend: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Upload the object and return its retrieval URL and remote handle.
    fn upload(
        &self,
        object: &UploadObject,
    ) -> impl std::future::Future<Output = Result<RemoteObject, StorageError>> + Send;

    /// Delete the remote object behind a stored record. Deleting an object
    /// that is already gone succeeds.
    fn delete(
        &self,
        record: &StoredFile,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

/// Object-safe storage backend trait for use behind `Arc<dyn DynStorageBackend>`.
///
/// Implement [`StorageBackend`] instead and rely on the blanket implementation.
#[async_trait]
pub trait DynStorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn upload(&self, object: &UploadObject) -> Result<RemoteObject, StorageError>;

    async fn delete(&self, record: &StoredFile) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: StorageBackend + Sync> DynStorageBackend for T {
    fn kind(&self) -> BackendKind {
        StorageBackend::kind(self)
    }

    async fn upload(&self, object: &UploadObject) -> Result<RemoteObject, StorageError> {
        StorageBackend::upload(self, object).await
    }

    async fn delete(&self, record: &StoredFile) -> Result<(), StorageError> {
        StorageBackend::delete(self, record).await
    }
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Map non-success HTTP responses onto [`StorageError`].
pub(crate) async fn check_status(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!(service, "remote storage rate limit hit");
        return Err(StorageError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StorageError::Remote(format!("{service} HTTP {status}: {body}")));
    }
    Ok(response)
}
