//! Recording backends for tests of the upload path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use filekeep_core::{BackendKind, StoredFile};

use crate::backend::{DynStorageBackend, RemoteObject, StorageBackend, UploadObject};
use crate::credentials::BackendCredential;
use crate::error::StorageError;
use crate::factory::BackendFactory;

/// One remote operation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Upload { kind: BackendKind, name: String },
    Delete { kind: BackendKind, remote_id: String },
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<BackendCall>>,
    next_id: AtomicU64,
    upload_error: Mutex<Option<String>>,
}

impl Shared {
    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// Backend that records calls instead of talking to a service.
///
/// Every upload gets a fresh remote id, so a re-upload of the same name is
/// distinguishable from the object it replaces.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    kind: BackendKind,
    shared: Arc<Shared>,
}

impl StorageBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn upload(&self, object: &UploadObject) -> Result<RemoteObject, StorageError> {
        self.shared.record(BackendCall::Upload {
            kind: self.kind,
            name: object.name.clone(),
        });
        let failure = self
            .shared
            .upload_error
            .lock()
            .ok()
            .and_then(|e| e.clone());
        if let Some(message) = failure {
            return Err(StorageError::Remote(message));
        }
        let n = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(RemoteObject {
            url: format!("https://stub.{}/{}/{}", self.kind, object.owner_id, object.name),
            remote_id: format!("{}-{n}", self.kind),
        })
    }

    async fn delete(&self, record: &StoredFile) -> Result<(), StorageError> {
        self.shared.record(BackendCall::Delete {
            kind: self.kind,
            remote_id: record.remote_id.clone(),
        });
        Ok(())
    }
}

/// Factory handing out [`RecordingBackend`]s that share one call log.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    shared: Arc<Shared>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail with [`StorageError::Remote`].
    #[must_use]
    pub fn with_upload_error(self, message: impl Into<String>) -> Self {
        if let Ok(mut slot) = self.shared.upload_error.lock() {
            *slot = Some(message.into());
        }
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.shared
            .calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Upload { .. }))
            .count()
    }
}

impl BackendFactory for RecordingFactory {
    fn create(
        &self,
        credential: &BackendCredential,
    ) -> Result<Arc<dyn DynStorageBackend>, StorageError> {
        Ok(Arc::new(RecordingBackend {
            kind: credential.kind(),
            shared: Arc::clone(&self.shared),
        }))
    }
}
