use std::fmt;
use std::fmt::Write;

use filekeep_core::{BackendKind, StoredFile};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::backend::{RemoteObject, StorageBackend, UploadObject, check_status};
use crate::error::StorageError;

const DEFAULT_API_URL: &str = "https://api.dropboxapi.com/2";
const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com/2";

/// Account settings for the Dropbox backend.
#[derive(Clone)]
pub struct DropboxConfig {
    pub access_token: String,
    /// RPC endpoint root (`files/delete_v2`, `sharing/*`).
    pub api_url: String,
    /// Content endpoint root (`files/upload`).
    pub content_url: String,
}

impl DropboxConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_url: DEFAULT_API_URL.to_owned(),
            content_url: DEFAULT_CONTENT_URL.to_owned(),
        }
    }

    /// Point both endpoint roots at `base_url` (for tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.api_url.clone_from(&base_url);
        self.content_url = base_url;
        self
    }
}

impl fmt::Debug for DropboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxConfig")
            .field("access_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("content_url", &self.content_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    path_display: String,
}

#[derive(Debug, Deserialize)]
struct SharedLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ListSharedLinks {
    links: Vec<SharedLink>,
}

/// Dropbox backend.
///
/// Files live at `/{name}` in the app folder and are uploaded in overwrite
/// mode. A public link is reused when one exists and minted otherwise; either
/// way it is rewritten to the `raw=1` form so the URL serves the file bytes.
pub struct DropboxBackend {
    config: DropboxConfig,
    client: Client,
}

impl DropboxBackend {
    /// Create a backend with its own HTTP client.
    pub fn new(config: DropboxConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Create a backend that shares an existing HTTP client.
    pub fn with_client(config: DropboxConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn api(&self, route: &str) -> String {
        format!("{}/{route}", self.config.api_url.trim_end_matches('/'))
    }

    fn content(&self, route: &str) -> String {
        format!("{}/{route}", self.config.content_url.trim_end_matches('/'))
    }

    async fn rpc(
        &self,
        route: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, StorageError> {
        Ok(self
            .client
            .post(self.api(route))
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await?)
    }

    /// Reuse the first existing shared link for `path`, or create one.
    async fn shared_link(&self, path: &str) -> Result<String, StorageError> {
        let response = self
            .rpc(
                "sharing/list_shared_links",
                &json!({ "path": path, "direct_only": true }),
            )
            .await?;
        let existing: ListSharedLinks = check_status("Dropbox", response).await?.json().await?;
        if let Some(link) = existing.links.into_iter().next() {
            debug!("reusing existing Dropbox shared link");
            return Ok(link.url);
        }

        let response = self
            .rpc(
                "sharing/create_shared_link_with_settings",
                &json!({ "path": path }),
            )
            .await?;
        let created: SharedLink = check_status("Dropbox", response).await?.json().await?;
        Ok(created.url)
    }
}

impl fmt::Debug for DropboxBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageBackend for DropboxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dropbox
    }

    #[instrument(skip(self, object), fields(backend = "dropbox", name = %object.name))]
    async fn upload(&self, object: &UploadObject) -> Result<RemoteObject, StorageError> {
        let path = format!("/{}", object.name);
        let bytes = object.read().await?;
        let arg = json!({
            "path": path,
            "mode": "overwrite",
            "autorename": false,
            "mute": true,
        });

        let response = self
            .client
            .post(self.content("files/upload"))
            .bearer_auth(&self.config.access_token)
            .header("Dropbox-API-Arg", header_safe_json(&arg))
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        let metadata: FileMetadata = check_status("Dropbox", response).await?.json().await?;

        let url = raw_link(&self.shared_link(&metadata.path_display).await?);
        info!(path = %metadata.path_display, "uploaded to Dropbox");
        Ok(RemoteObject {
            url,
            remote_id: metadata.path_display,
        })
    }

    #[instrument(skip(self, record), fields(backend = "dropbox", remote_id = %record.remote_id))]
    async fn delete(&self, record: &StoredFile) -> Result<(), StorageError> {
        let response = self
            .rpc("files/delete_v2", &json!({ "path": record.remote_id }))
            .await?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            if body.contains("not_found") {
                debug!("Dropbox file already gone");
                return Ok(());
            }
            return Err(StorageError::Remote(format!("Dropbox delete conflict: {body}")));
        }
        check_status("Dropbox", response).await?;
        Ok(())
    }
}

/// Rewrite a shared link so it serves the file itself instead of a preview
/// page: `dl=0` becomes `raw=1`, and `raw=1` is appended when absent.
fn raw_link(url: &str) -> String {
    if url.contains("dl=0") {
        url.replacen("dl=0", "raw=1", 1)
    } else if url.contains("raw=1") {
        url.to_owned()
    } else if url.contains('?') {
        format!("{url}&raw=1")
    } else {
        format!("{url}?raw=1")
    }
}

/// Serialise JSON for an HTTP header: non-ASCII characters are escaped as
/// `\uXXXX` so file names outside ASCII survive the header encoding.
fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}
