use thiserror::Error;

/// Errors that can occur while classifying content.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out.
    #[error("classification request timed out after {0}s")]
    Timeout(u64),

    /// The inference API returned an error response.
    #[error("inference API error: {0}")]
    Api(String),

    /// The API response did not have the chat completions shape.
    #[error("failed to parse inference response: {0}")]
    ParseError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClassifierError {
    /// Returns `true` if a later attempt could succeed.
    ///
    /// The pipeline never retries on its own; a later filesystem event for
    /// the same path triggers a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout(_) | Self::Api(_))
    }
}
