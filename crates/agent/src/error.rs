use std::path::PathBuf;

use filekeep_extract::ExtractError;
use filekeep_llm::ClassifierError;
use filekeep_storage::StorageError;
use thiserror::Error;

/// Errors loading the agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Neither the config file nor the environment supplies an API key.
    #[error("no classifier API key: set classifier.api_key or FILEKEEP_LLM_API_KEY")]
    MissingApiKey,
}

/// Errors from the filesystem watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Errors sending a file across the upload boundary.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Transport failure talking to the upload endpoint.
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upload endpoint rejected the file.
    #[error("server: {message}")]
    Server { status: u16, message: String },

    /// The in-process upload service rejected the file.
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to stage {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why the analysis of one file ended without an upload.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("classification failed: {0}")]
    Classify(#[from] ClassifierError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl IntakeError {
    /// `true` when the same file could go through on a later event.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Extract(_) => false,
            Self::Classify(e) => e.is_retryable(),
            Self::Upload(UploadError::Http(_)) => true,
            Self::Upload(UploadError::Storage(e)) => e.is_retryable(),
            Self::Upload(_) => false,
        }
    }
}

/// Errors that stop the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("agent token file: {0}")]
    Token(#[from] std::io::Error),
    /// The runtime is not running any more.
    #[error("agent is not running")]
    Stopped,
}
