//! The upload boundary: where the pipeline hands off a qualifying file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use filekeep_core::BackendKind;
use filekeep_storage::{StagedFile, UploadOutcome, UploadService};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::UploadError;
use crate::token::AgentToken;

/// What the upload side reports back for a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    /// Canonical retrieval URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Backend that actually holds the file.
    #[serde(default)]
    pub platform: Option<BackendKind>,
    /// `true` when the content was already stored and nothing was sent.
    #[serde(default)]
    pub existing: bool,
}

impl From<UploadOutcome> for UploadReceipt {
    fn from(outcome: UploadOutcome) -> Self {
        let existing = outcome.is_existing();
        let record = match outcome {
            UploadOutcome::Uploaded(r) | UploadOutcome::Existing(r) => r,
        };
        let message = if existing {
            format!("File '{}' already exists in your account.", record.name)
        } else {
            "File uploaded successfully".to_owned()
        };
        Self {
            message,
            url: Some(record.url),
            platform: Some(record.backend),
            existing,
        }
    }
}

/// Sends one file to wherever uploads go.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError>;
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_owned())
}

/// Multipart upload to a remote upload endpoint.
///
/// The form carries a `file` part named after the original file and an
/// `agentToken` text part identifying the installation.
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    token: AgentToken,
}

impl HttpUploader {
    pub fn new(
        endpoint: impl Into<String>,
        token: AgentToken,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }
}

impl std::fmt::Debug for HttpUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUploader")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl Uploader for HttpUploader {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(size = bytes.len(), "sending file to upload endpoint");
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name(path)))
            .text("agentToken", self.token.as_str().to_owned());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return Err(UploadError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: UploadReceipt = response.json().await?;
        info!(url = ?receipt.url, existing = receipt.existing, "upload accepted");
        Ok(receipt)
    }
}

/// In-process upload straight into an [`UploadService`].
///
/// The file is first copied into `staging_dir`; the service owns and removes
/// the copy, so the watched original is never touched.
pub struct LocalUploader {
    service: Arc<UploadService>,
    token: AgentToken,
    staging_dir: PathBuf,
}

impl LocalUploader {
    pub fn new(
        service: Arc<UploadService>,
        token: AgentToken,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            service,
            token,
            staging_dir: staging_dir.into(),
        }
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        let io_err = |path: &Path, source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| io_err(&self.staging_dir, e))?;

        let name = file_name(path);
        let staged_path = self.staging_dir.join(format!("{}-{name}", Uuid::new_v4()));
        // Created before the copy so a partial copy is removed too.
        let staged = StagedFile::new(&staged_path, name);
        tokio::fs::copy(path, &staged_path)
            .await
            .map_err(|e| io_err(path, e))?;

        let outcome = self.service.upload(self.token.as_str(), staged).await?;
        Ok(outcome.into())
    }
}
