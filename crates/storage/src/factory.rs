use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::backend::DynStorageBackend;
use crate::cloudinary::{CloudinaryBackend, CloudinaryConfig};
use crate::credentials::BackendCredential;
use crate::dropbox::{DropboxBackend, DropboxConfig};
use crate::error::StorageError;
use crate::mega::{MegaBackend, MegaConnector};

/// Builds a backend for one upload attempt from freshly resolved credentials.
pub trait BackendFactory: Send + Sync {
    fn create(
        &self,
        credential: &BackendCredential,
    ) -> Result<Arc<dyn DynStorageBackend>, StorageError>;
}

/// Factory for the real backends, sharing one HTTP client between them.
#[derive(Debug, Clone)]
pub struct DefaultBackendFactory {
    client: Client,
    cloudinary_base_url: Option<String>,
    dropbox_base_url: Option<String>,
    mega: Option<Arc<dyn MegaConnector>>,
}

impl DefaultBackendFactory {
    pub fn new() -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            cloudinary_base_url: None,
            dropbox_base_url: None,
            mega: None,
        })
    }

    #[must_use]
    pub fn with_cloudinary_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.cloudinary_base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_dropbox_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.dropbox_base_url = Some(base_url.into());
        self
    }

    /// Enable the Mega backend through the given SDK connector.
    #[must_use]
    pub fn with_mega_connector(mut self, connector: Arc<dyn MegaConnector>) -> Self {
        self.mega = Some(connector);
        self
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create(
        &self,
        credential: &BackendCredential,
    ) -> Result<Arc<dyn DynStorageBackend>, StorageError> {
        if !credential.is_complete() {
            return Err(StorageError::CredentialsMissing(credential.kind()));
        }
        let backend: Arc<dyn DynStorageBackend> = match credential {
            BackendCredential::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
            } => {
                let mut config = CloudinaryConfig::new(cloud_name, api_key, api_secret);
                if let Some(url) = &self.cloudinary_base_url {
                    config = config.with_base_url(url);
                }
                Arc::new(CloudinaryBackend::with_client(config, self.client.clone()))
            }
            BackendCredential::Dropbox { access_token } => {
                let mut config = DropboxConfig::new(access_token);
                if let Some(url) = &self.dropbox_base_url {
                    config = config.with_base_url(url);
                }
                Arc::new(DropboxBackend::with_client(config, self.client.clone()))
            }
            BackendCredential::Mega { email, password } => {
                let connector = self.mega.clone().ok_or_else(|| {
                    StorageError::Configuration("no Mega connector is installed".into())
                })?;
                Arc::new(MegaBackend::new(connector, email, password))
            }
        };
        Ok(backend)
    }
}
