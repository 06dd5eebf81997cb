use std::fmt;

/// Configuration for the HTTP classifier.
#[derive(Clone)]
pub struct ClassifierConfig {
    /// OpenAI-compatible chat completions endpoint
    /// (e.g., `https://api.openai.com/v1/chat/completions`).
    pub endpoint: String,
    /// Model used for text-bearing files.
    pub model: String,
    /// Model used for images. Defaults to `model`.
    pub vision_model: String,
    /// API key for authentication.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Temperature for sampling (0.0 = deterministic).
    pub temperature: f64,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
}

impl ClassifierConfig {
    /// Create a new config with the given endpoint, model, and API key.
    ///
    /// Uses sensible defaults: 30s timeout, temperature 0.0, max 512 tokens,
    /// and the same model for images as for text.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            endpoint: endpoint.into(),
            vision_model: model.clone(),
            model,
            api_key: api_key.into(),
            timeout_seconds: 30,
            temperature: 0.0,
            max_tokens: 512,
        }
    }

    /// Use a separate model for image classification.
    #[must_use]
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the temperature for sampling.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum tokens in the response.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("api_key", &"[REDACTED]")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
