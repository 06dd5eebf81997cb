//! Mega backend.
//!
//! Mega's protocol is client-side encrypted and only reachable through an
//! SDK, so the wire client is injected as a [`MegaConnector`]. This module
//! owns the upload sequence the service requires: declare the byte size,
//! stream the content, wait for the upload to complete, then request a
//! public link for the finished node.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use filekeep_core::{BackendKind, StoredFile};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

use crate::backend::{RemoteObject, StorageBackend, UploadObject, io_error};
use crate::error::StorageError;

const CHUNK_SIZE: usize = 1024 * 1024;

/// A finished file node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MegaNode {
    /// Node handle, stable for the lifetime of the remote file.
    pub handle: String,
}

/// Opens authenticated Mega sessions.
#[async_trait]
pub trait MegaConnector: Send + Sync + fmt::Debug {
    async fn login(&self, email: &str, password: &str)
    -> Result<Box<dyn MegaSession>, StorageError>;
}

/// An authenticated Mega session.
#[async_trait]
pub trait MegaSession: Send + Sync {
    /// Start an upload of exactly `size` bytes under `name`.
    async fn begin_upload(
        &self,
        name: &str,
        size: u64,
    ) -> Result<Box<dyn MegaUpload>, StorageError>;

    /// Export a public link for a finished node.
    async fn link(&self, node: &MegaNode) -> Result<String, StorageError>;

    /// Delete a node by handle. Deleting a missing node succeeds.
    async fn delete(&self, handle: &str) -> Result<(), StorageError>;
}

/// An upload in progress.
#[async_trait]
pub trait MegaUpload: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Wait until the service has accepted the whole file.
    async fn complete(self: Box<Self>) -> Result<MegaNode, StorageError>;
}

/// Mega backend driving an injected [`MegaConnector`].
pub struct MegaBackend {
    connector: Arc<dyn MegaConnector>,
    email: String,
    password: String,
}

impl MegaBackend {
    pub fn new(
        connector: Arc<dyn MegaConnector>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for MegaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MegaBackend")
            .field("connector", &self.connector)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl StorageBackend for MegaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mega
    }

    #[instrument(skip(self, object), fields(backend = "mega", name = %object.name))]
    async fn upload(&self, object: &UploadObject) -> Result<RemoteObject, StorageError> {
        let mut file = tokio::fs::File::open(&object.path)
            .await
            .map_err(|e| io_error(&object.path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| io_error(&object.path, e))?
            .len();

        let session = self.connector.login(&self.email, &self.password).await?;
        let mut upload = session.begin_upload(&object.name, size).await?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut sent: u64 = 0;
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| io_error(&object.path, e))?;
            if n == 0 {
                break;
            }
            upload.write_chunk(&buf[..n]).await?;
            sent += n as u64;
        }
        if sent != size {
            return Err(StorageError::Remote(format!(
                "file changed during upload: declared {size} bytes, sent {sent}"
            )));
        }

        let node = upload.complete().await?;
        debug!(handle = %node.handle, "Mega upload complete");
        let url = session.link(&node).await?;

        info!(handle = %node.handle, "uploaded to Mega");
        Ok(RemoteObject {
            url,
            remote_id: node.handle,
        })
    }

    #[instrument(skip(self, record), fields(backend = "mega", remote_id = %record.remote_id))]
    async fn delete(&self, record: &StoredFile) -> Result<(), StorageError> {
        let session = self.connector.login(&self.email, &self.password).await?;
        session.delete(&record.remote_id).await
    }
}
