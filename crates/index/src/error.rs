use std::path::PathBuf;

use thiserror::Error;

/// Errors from hashing and file index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to hash {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index backend error: {0}")]
    Backend(String),
}
