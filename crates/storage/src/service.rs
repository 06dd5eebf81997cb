//! Upload path: dedup, old-version replacement, backend upload, record
//! creation and owner notification.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use filekeep_core::{
    BackendKind, LogSink, Notification, NotificationKind, NotificationSink, StoredFile,
};
use filekeep_index::{FileIndex, InsertOutcome, hash_file};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{DynStorageBackend, UploadObject, io_error};
use crate::credentials::{AccountStore, BackendCredential};
use crate::error::StorageError;
use crate::factory::BackendFactory;

/// A local copy of an incoming file, owned by the upload path.
///
/// The file is removed when the value is dropped, whatever the upload
/// outcome was.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    name: String,
    mime_type: String,
}

impl StagedFile {
    /// Take ownership of `path`, recording the name the file had on the
    /// client.
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        let name = original_name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        Self {
            path: path.into(),
            name,
            mime_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "staged file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staged file"),
        }
    }
}

/// Result of [`UploadService::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The file was sent to a backend and recorded.
    Uploaded(StoredFile),
    /// The owner already has a file with the same bytes; nothing was sent.
    Existing(StoredFile),
}

impl UploadOutcome {
    pub fn record(&self) -> &StoredFile {
        match self {
            Self::Uploaded(r) | Self::Existing(r) => r,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, Self::Existing(_))
    }
}

/// Orchestrates one upload against the owner's preferred backend.
pub struct UploadService {
    index: Arc<dyn FileIndex>,
    accounts: Arc<dyn AccountStore>,
    factory: Arc<dyn BackendFactory>,
    sink: Arc<dyn NotificationSink>,
}

impl UploadService {
    pub fn new(
        index: Arc<dyn FileIndex>,
        accounts: Arc<dyn AccountStore>,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            index,
            accounts,
            factory,
            sink: Arc::new(LogSink),
        }
    }

    /// Send owner-scoped notifications to `sink` instead of the log.
    #[must_use]
    pub fn with_notifier(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Upload a staged file on behalf of the agent holding `agent_token`.
    ///
    /// A content-hash hit returns the existing record without contacting any
    /// backend. Otherwise previous versions under the same name on the target
    /// backend are deleted before the new upload starts. The staged file is
    /// removed on every path out of this function.
    pub async fn upload(
        &self,
        agent_token: &str,
        staged: StagedFile,
    ) -> Result<UploadOutcome, StorageError> {
        let account = self
            .accounts
            .resolve_agent(agent_token)
            .await?
            .ok_or(StorageError::UnknownAgent)?;
        let owner_id = account.owner_id.as_str();

        let content_hash = hash_file(staged.path()).await?;
        if let Some(existing) = self.index.lookup(owner_id, &content_hash).await? {
            info!(owner_id, name = staged.name(), url = %existing.url, "content already stored");
            self.notify_owner(
                owner_id,
                Notification::info(
                    NotificationKind::Status,
                    format!("File '{}' already exists in your account.", staged.name()),
                ),
            );
            return Ok(UploadOutcome::Existing(existing));
        }

        let kind = account.preferred_backend;
        let credential = self
            .accounts
            .credential(owner_id, kind)
            .await?
            .filter(BackendCredential::is_complete)
            .ok_or(StorageError::CredentialsMissing(kind))?;
        let backend = self.factory.create(&credential)?;

        self.replace(backend.as_ref(), owner_id, staged.name()).await?;

        let size_bytes = tokio::fs::metadata(staged.path())
            .await
            .map_err(|e| io_error(staged.path(), e))?
            .len();
        let object = UploadObject {
            owner_id: owner_id.to_owned(),
            name: staged.name().to_owned(),
            path: staged.path().to_path_buf(),
            size_bytes,
            mime_type: staged.mime_type().to_owned(),
        };
        let remote = backend.upload(&object).await?;

        let record = StoredFile {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_owned(),
            name: object.name,
            size_bytes,
            mime_type: object.mime_type,
            backend: kind,
            url: remote.url,
            remote_id: remote.remote_id,
            content_hash,
            created_at: Utc::now(),
        };

        match self.index.insert(record.clone()).await? {
            InsertOutcome::Inserted => {
                info!(owner_id, name = %record.name, backend = %kind, url = %record.url, "file uploaded");
                self.notify_owner(
                    owner_id,
                    Notification::info(
                        NotificationKind::UploadSuccess,
                        format!("File '{}' uploaded successfully.", record.name),
                    ),
                );
                Ok(UploadOutcome::Uploaded(record))
            }
            InsertOutcome::Duplicate(existing) => {
                // A concurrent upload of the same bytes committed first.
                if existing.remote_id != record.remote_id || existing.backend != record.backend {
                    if let Err(e) = backend.delete(&record).await {
                        warn!(owner_id, remote_id = %record.remote_id, error = %e, "failed to remove duplicate remote object");
                    }
                }
                self.notify_owner(
                    owner_id,
                    Notification::info(
                        NotificationKind::Status,
                        format!("File '{}' already exists in your account.", record.name),
                    ),
                );
                Ok(UploadOutcome::Existing(existing))
            }
        }
    }

    /// Delete every earlier version of `name` on this backend, remote object
    /// first, then its record.
    async fn replace(
        &self,
        backend: &dyn DynStorageBackend,
        owner_id: &str,
        name: &str,
    ) -> Result<(), StorageError> {
        let previous = self
            .index
            .find_by_name(owner_id, name, backend.kind())
            .await?;
        for record in previous {
            debug!(owner_id, name, remote_id = %record.remote_id, "replacing previous version");
            backend.delete(&record).await?;
            self.index.remove(record.id).await?;
        }
        Ok(())
    }

    /// The owner's files, newest first.
    pub async fn list_files(&self, owner_id: &str) -> Result<Vec<StoredFile>, StorageError> {
        Ok(self.index.list(owner_id).await?)
    }

    /// Hard-delete a file record. The remote object is left in place.
    pub async fn delete_file(&self, owner_id: &str, id: Uuid) -> Result<(), StorageError> {
        let record = self
            .index
            .get(id)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        if record.owner_id != owner_id {
            return Err(StorageError::NotOwner(id));
        }
        self.index.remove(id).await?;
        info!(owner_id, %id, "file record deleted");
        Ok(())
    }

    pub async fn add_credentials(
        &self,
        owner_id: &str,
        credential: BackendCredential,
    ) -> Result<(), StorageError> {
        let kind = credential.kind();
        if !credential.is_complete() {
            return Err(StorageError::CredentialsMissing(kind));
        }
        self.accounts.set_credentials(owner_id, credential).await?;
        self.notify_owner(
            owner_id,
            Notification::info(
                NotificationKind::Status,
                format!("Credentials for {kind} added successfully."),
            ),
        );
        Ok(())
    }

    /// Switch the owner's preferred backend. Fails fast, without changing the
    /// preference, when the target backend has no complete credentials.
    pub async fn set_preferred_backend(
        &self,
        owner_id: &str,
        kind: BackendKind,
    ) -> Result<(), StorageError> {
        let configured = self
            .accounts
            .credential(owner_id, kind)
            .await?
            .is_some_and(|c| c.is_complete());
        if !configured {
            self.notify_owner(
                owner_id,
                Notification::error(
                    NotificationKind::Status,
                    format!("Credentials for {kind} are not added. Please add them first."),
                ),
            );
            return Err(StorageError::CredentialsMissing(kind));
        }

        self.accounts.set_preferred_backend(owner_id, kind).await?;
        self.notify_owner(
            owner_id,
            Notification::info(
                NotificationKind::Status,
                format!("Preferred platform changed to {kind}."),
            ),
        );
        Ok(())
    }

    fn notify_owner(&self, owner_id: &str, notification: Notification) {
        self.sink.notify(notification.with_owner(owner_id));
    }
}
