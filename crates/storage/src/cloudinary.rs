use std::fmt;

use chrono::Utc;
use filekeep_core::{BackendKind, StoredFile};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info, instrument};

use crate::backend::{RemoteObject, StorageBackend, UploadObject, check_status};
use crate::error::StorageError;

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";

/// Account settings for the Cloudinary backend.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API root, without the `/v1_1` suffix.
    pub base_url: String,
}

impl CloudinaryConfig {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Override the API root (for tests or regional endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    resource_type: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary backend using signed requests against the upload API.
///
/// The remote id is `"{resource_type}/{public_id}"`, since destroying an
/// asset needs both.
pub struct CloudinaryBackend {
    config: CloudinaryConfig,
    client: Client,
}

impl CloudinaryBackend {
    /// Create a backend with its own HTTP client.
    pub fn new(config: CloudinaryConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Create a backend that shares an existing HTTP client.
    pub fn with_client(config: CloudinaryConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{resource_type}/{action}",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Sign request parameters: sort by key, join as `k=v&k=v`, append the
    /// secret, and take the hex `SHA-1`.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha1::digest(format!("{joined}{}", self.config.api_secret)))
    }
}

impl fmt::Debug for CloudinaryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageBackend for CloudinaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloudinary
    }

    #[instrument(skip(self, object), fields(backend = "cloudinary", name = %object.name))]
    async fn upload(&self, object: &UploadObject) -> Result<RemoteObject, StorageError> {
        let bytes = object.read().await?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.as_str())]);

        let file = Part::bytes(bytes)
            .file_name(object.name.clone())
            .mime_str(&object.mime_type)
            .map_err(|e| StorageError::Configuration(format!("invalid MIME type: {e}")))?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        debug!(size = object.size_bytes, "uploading to Cloudinary");
        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = check_status("Cloudinary", response).await?.json().await?;

        info!(public_id = %uploaded.public_id, "uploaded to Cloudinary");
        Ok(RemoteObject {
            url: uploaded.secure_url,
            remote_id: format!("{}/{}", uploaded.resource_type, uploaded.public_id),
        })
    }

    #[instrument(skip(self, record), fields(backend = "cloudinary", remote_id = %record.remote_id))]
    async fn delete(&self, record: &StoredFile) -> Result<(), StorageError> {
        let (resource_type, public_id) = record
            .remote_id
            .split_once('/')
            .unwrap_or(("image", record.remote_id.as_str()));
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let response = self
            .client
            .post(self.endpoint(resource_type, "destroy"))
            .form(&[
                ("public_id", public_id),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;
        let destroyed: DestroyResponse = check_status("Cloudinary", response).await?.json().await?;

        match destroyed.result.as_str() {
            "ok" | "not found" => {
                debug!(result = %destroyed.result, "Cloudinary destroy finished");
                Ok(())
            }
            other => Err(StorageError::Remote(format!(
                "Cloudinary destroy returned '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use filekeep_core::ContentHash;
    use uuid::Uuid;

    use super::*;
    use filekeep_core::testing::MockHttpServer;

    fn backend(base_url: &str) -> CloudinaryBackend {
        let config = CloudinaryConfig::new("demo", "key-123", "shh").with_base_url(base_url);
        CloudinaryBackend::new(config).unwrap()
    }

    fn record(remote_id: &str) -> StoredFile {
        StoredFile {
            id: Uuid::now_v7(),
            owner_id: "owner".into(),
            name: "scan.png".into(),
            size_bytes: 3,
            mime_type: "image/png".into(),
            backend: BackendKind::Cloudinary,
            url: "https://res.cloudinary.com/demo/image/upload/abc.png".into(),
            remote_id: remote_id.into(),
            content_hash: ContentHash::from_digest(&[1; 32]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn signature_matches_documented_scheme() {
        // sha1("public_id=sample&timestamp=1315060510abcd")
        let b = CloudinaryBackend::with_client(
            CloudinaryConfig::new("demo", "k", "abcd"),
            Client::new(),
        );
        let sig = b.sign(&[("timestamp", "1315060510"), ("public_id", "sample")]);
        let expected = hex::encode(Sha1::digest("public_id=sample&timestamp=1315060510abcd"));
        assert_eq!(sig, expected);
        assert_eq!(sig.len(), 40);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = CloudinaryConfig::new("demo", "k", "super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn upload_posts_signed_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png").unwrap();
        let object = UploadObject {
            owner_id: "owner".into(),
            name: "scan.png".into(),
            path: PathBuf::from(&path),
            size_bytes: 3,
            mime_type: "image/png".into(),
        };

        let server = MockHttpServer::start().await;
        let b = backend(&server.base_url);
        let reply = r#"{"secure_url":"https://res.cloudinary.com/demo/image/upload/v1/abc.png","public_id":"abc","resource_type":"image"}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, reply).await });

        let remote = b.upload(&object).await.unwrap();
        let request = handle.await.unwrap();

        assert_eq!(remote.remote_id, "image/abc");
        assert!(remote.url.starts_with("https://res.cloudinary.com/"));
        assert_eq!(request.path(), "/v1_1/demo/auto/upload");
        let body = request.body_text();
        assert!(body.contains("name=\"api_key\""));
        assert!(body.contains("key-123"));
        assert!(body.contains("name=\"signature\""));
        assert!(body.contains("filename=\"scan.png\""));
    }

    #[tokio::test]
    async fn delete_destroys_by_resource_type() {
        let server = MockHttpServer::start().await;
        let b = backend(&server.base_url);
        let handle = tokio::spawn(async move { server.respond_once(200, r#"{"result":"ok"}"#).await });

        b.delete(&record("raw/report")).await.unwrap();
        let request = handle.await.unwrap();

        assert_eq!(request.path(), "/v1_1/demo/raw/destroy");
        assert!(request.body_text().contains("public_id=report"));
    }

    #[tokio::test]
    async fn delete_of_missing_asset_succeeds() {
        let server = MockHttpServer::start().await;
        let b = backend(&server.base_url);
        let handle = tokio::spawn(async move {
            server
                .respond_once(200, r#"{"result":"not found"}"#)
                .await
        });

        b.delete(&record("image/gone")).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn upload_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"a").unwrap();
        let object = UploadObject {
            owner_id: "owner".into(),
            name: "a.txt".into(),
            path,
            size_bytes: 1,
            mime_type: "text/plain".into(),
        };

        let server = MockHttpServer::start().await;
        let b = backend(&server.base_url);
        let handle = tokio::spawn(async move {
            server
                .respond_once(429, r#"{"error":{"message":"slow down"}}"#)
                .await
        });

        let err = b.upload(&object).await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(err, StorageError::RateLimited));
        assert!(err.is_retryable());
    }
}
