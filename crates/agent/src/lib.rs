//! The filekeep agent: watches directories, scores new and changed files
//! with an inference service and uploads the important ones.

pub mod config;
pub mod debounce;
pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod token;
pub mod upload;
pub mod watcher;

pub use config::AgentConfig;
pub use debounce::Debouncer;
pub use error::{AgentError, ConfigError, IntakeError, UploadError, WatchError};
pub use pipeline::{AnalysisOutcome, AnalysisState, IntakePipeline};
pub use runtime::{AgentRuntime, WatchControl};
pub use token::AgentToken;
pub use upload::{HttpUploader, LocalUploader, UploadReceipt, Uploader};
pub use watcher::WatcherManager;
