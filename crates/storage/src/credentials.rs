use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use filekeep_core::BackendKind;

use crate::error::StorageError;

/// Per-owner, per-backend secret bundle.
///
/// Resolved once per upload attempt and never cached, since the owner can
/// rotate it at any time.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendCredential {
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
    Dropbox {
        access_token: String,
    },
    Mega {
        email: String,
        password: String,
    },
}

impl BackendCredential {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Cloudinary { .. } => BackendKind::Cloudinary,
            Self::Dropbox { .. } => BackendKind::Dropbox,
            Self::Mega { .. } => BackendKind::Mega,
        }
    }

    /// Returns `true` when no field is blank.
    pub fn is_complete(&self) -> bool {
        let fields: &[&str] = match self {
            Self::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
            } => &[cloud_name, api_key, api_secret],
            Self::Dropbox { access_token } => &[access_token],
            Self::Mega { email, password } => &[email, password],
        };
        fields.iter().all(|f| !f.trim().is_empty())
    }
}

impl fmt::Debug for BackendCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloudinary {
                cloud_name,
                api_key,
                ..
            } => f
                .debug_struct("Cloudinary")
                .field("cloud_name", cloud_name)
                .field("api_key", api_key)
                .field("api_secret", &"[REDACTED]")
                .finish(),
            Self::Dropbox { .. } => f
                .debug_struct("Dropbox")
                .field("access_token", &"[REDACTED]")
                .finish(),
            Self::Mega { email, .. } => f
                .debug_struct("Mega")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// An owner as seen by the upload path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub owner_id: String,
    /// Backend new uploads go to.
    pub preferred_backend: BackendKind,
}

/// Owner accounts: agent-token resolution, backend preference and
/// per-backend credentials.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find the account an agent token belongs to.
    async fn resolve_agent(&self, agent_token: &str) -> Result<Option<Account>, StorageError>;

    async fn account(&self, owner_id: &str) -> Result<Option<Account>, StorageError>;

    /// Current credential for `kind`, if the owner configured one.
    async fn credential(
        &self,
        owner_id: &str,
        kind: BackendKind,
    ) -> Result<Option<BackendCredential>, StorageError>;

    /// Store or replace the credential for `credential.kind()`.
    async fn set_credentials(
        &self,
        owner_id: &str,
        credential: BackendCredential,
    ) -> Result<(), StorageError>;

    /// Persist the preference. Credential checks belong to the caller.
    async fn set_preferred_backend(
        &self,
        owner_id: &str,
        kind: BackendKind,
    ) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct AccountEntry {
    account: Account,
    credentials: HashMap<BackendKind, BackendCredential>,
}

/// In-memory [`AccountStore`].
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, AccountEntry>,
    agent_tokens: DashMap<String, String>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or re-link) an account with the default backend preference
    /// and bind `agent_token` to it.
    pub fn register(&self, owner_id: impl Into<String>, agent_token: impl Into<String>) {
        let owner_id = owner_id.into();
        self.accounts
            .entry(owner_id.clone())
            .or_insert_with(|| AccountEntry {
                account: Account {
                    owner_id: owner_id.clone(),
                    preferred_backend: BackendKind::default(),
                },
                credentials: HashMap::new(),
            });
        self.agent_tokens.insert(agent_token.into(), owner_id);
    }

    fn unknown_owner(owner_id: &str) -> StorageError {
        StorageError::Configuration(format!("unknown owner '{owner_id}'"))
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn resolve_agent(&self, agent_token: &str) -> Result<Option<Account>, StorageError> {
        let Some(owner_id) = self.agent_tokens.get(agent_token).map(|o| o.clone()) else {
            return Ok(None);
        };
        self.account(&owner_id).await
    }

    async fn account(&self, owner_id: &str) -> Result<Option<Account>, StorageError> {
        Ok(self.accounts.get(owner_id).map(|e| e.account.clone()))
    }

    async fn credential(
        &self,
        owner_id: &str,
        kind: BackendKind,
    ) -> Result<Option<BackendCredential>, StorageError> {
        Ok(self
            .accounts
            .get(owner_id)
            .and_then(|e| e.credentials.get(&kind).cloned()))
    }

    async fn set_credentials(
        &self,
        owner_id: &str,
        credential: BackendCredential,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .accounts
            .get_mut(owner_id)
            .ok_or_else(|| Self::unknown_owner(owner_id))?;
        entry.credentials.insert(credential.kind(), credential);
        Ok(())
    }

    async fn set_preferred_backend(
        &self,
        owner_id: &str,
        kind: BackendKind,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .accounts
            .get_mut(owner_id)
            .ok_or_else(|| Self::unknown_owner(owner_id))?;
        entry.account.preferred_backend = kind;
        Ok(())
    }
}
