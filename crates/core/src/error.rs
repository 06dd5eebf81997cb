use thiserror::Error;

/// Errors raised while parsing core model values from untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The string does not name a known storage backend.
    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),

    /// The string is not a valid hex-encoded `SHA-256` digest.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}
