use std::path::{Path, PathBuf};
use std::time::Duration;

use filekeep_extract::DEFAULT_CHAR_LIMIT;
use filekeep_llm::ClassifierConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable consulted when `classifier.api_key` is not set.
pub const API_KEY_ENV: &str = "FILEKEEP_LLM_API_KEY";

/// Top-level agent configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct AgentConfig {
    /// Directories to watch and how.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Inference service used to score files.
    #[serde(default)]
    pub classifier: ClassifierSection,
    /// Extraction and upload-decision settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Where qualifying files are sent.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Local agent identity.
    #[serde(default)]
    pub agent: AgentSection,
}

impl AgentConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(toml::from_str("")?);
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Watch configuration.
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    /// Directories to observe, recursively.
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,
    /// Quiet period before a changed file is analyzed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Poll the filesystem at this interval instead of using native events.
    pub poll_interval_ms: Option<u64>,
    /// Also react to dot-files and files inside dot-directories.
    #[serde(default)]
    pub include_hidden: bool,
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: None,
            include_hidden: false,
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| vec![PathBuf::from(home).join("Downloads")])
        .unwrap_or_default()
}

fn default_debounce_ms() -> u64 {
    2000
}

/// `[classifier]` section.
#[derive(Deserialize)]
pub struct ClassifierSection {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model for images; falls back to `model`.
    pub vision_model: Option<String>,
    /// API key; falls back to [`API_KEY_ENV`].
    pub api_key: Option<String>,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ClassifierSection {
    /// Build the classifier config, resolving the API key from the
    /// environment when the file does not set one.
    pub fn to_classifier_config(&self) -> Result<ClassifierConfig, ConfigError> {
        let api_key = resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = ClassifierConfig::new(&self.endpoint, &self.model, api_key)
            .with_timeout(self.timeout_seconds)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(vision) = &self.vision_model {
            config = config.with_vision_model(vision);
        }
        Ok(config)
    }
}

impl std::fmt::Debug for ClassifierSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierSection")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            model: default_model(),
            vision_model: None,
            api_key: None,
            timeout_seconds: default_classifier_timeout(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Prefer the configured key; blank values count as unset.
fn resolve_api_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::to_owned)
        .into_iter()
        .chain(from_env)
        .map(|k| k.trim().to_owned())
        .find(|k| !k.is_empty())
}

fn default_classifier_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_owned()
}

fn default_model() -> String {
    "gpt-4o-mini".to_owned()
}

fn default_classifier_timeout() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    512
}

/// `[pipeline]` section.
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    /// Lowest importance score that is uploaded.
    #[serde(default = "default_upload_threshold")]
    pub upload_threshold: i32,
    /// Character cap for extracted text.
    #[serde(default = "default_text_char_limit")]
    pub text_char_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_threshold: default_upload_threshold(),
            text_char_limit: default_text_char_limit(),
        }
    }
}

fn default_upload_threshold() -> i32 {
    6
}

fn default_text_char_limit() -> usize {
    DEFAULT_CHAR_LIMIT
}

/// `[upload]` section.
#[derive(Debug, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_seconds: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_upload_endpoint(),
            timeout_seconds: default_upload_timeout(),
        }
    }
}

fn default_upload_endpoint() -> String {
    "http://localhost:5500/api/file/upload".to_owned()
}

fn default_upload_timeout() -> u64 {
    120
}

/// `[agent]` section.
#[derive(Debug, Deserialize)]
pub struct AgentSection {
    /// File holding the agent identity token.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// How often to look for the token file while it is missing.
    #[serde(default = "default_token_poll")]
    pub token_poll_seconds: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            token_poll_seconds: default_token_poll(),
        }
    }
}

fn default_token_path() -> PathBuf {
    PathBuf::from("agent-token.txt")
}

fn default_token_poll() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config.watch.debounce(), Duration::from_secs(2));
        assert!(config.watch.poll_interval().is_none());
        assert!(!config.watch.include_hidden);
        assert_eq!(config.pipeline.upload_threshold, 6);
        assert_eq!(config.pipeline.text_char_limit, 25_000);
        assert_eq!(
            config.upload.endpoint,
            "http://localhost:5500/api/file/upload"
        );
        assert_eq!(config.agent.token_path, PathBuf::from("agent-token.txt"));
        assert_eq!(config.agent.token_poll_seconds, 5);
    }

    #[test]
    fn sections_override_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            [watch]
            directories = ["/srv/inbox", "/srv/scans"]
            debounce_ms = 500
            poll_interval_ms = 1000

            [classifier]
            model = "local-model"
            vision_model = "local-vision"
            api_key = "sk-test"

            [pipeline]
            upload_threshold = 8
            "#,
        )
        .unwrap();

        assert_eq!(
            config.watch.directories,
            vec![PathBuf::from("/srv/inbox"), PathBuf::from("/srv/scans")]
        );
        assert_eq!(config.watch.debounce(), Duration::from_millis(500));
        assert_eq!(config.watch.poll_interval(), Some(Duration::from_secs(1)));
        assert_eq!(config.pipeline.upload_threshold, 8);

        let classifier = config.classifier.to_classifier_config().unwrap();
        assert_eq!(classifier.model, "local-model");
        assert_eq!(classifier.vision_model, "local-vision");
        assert_eq!(classifier.api_key, "sk-test");
    }

    #[test]
    fn api_key_prefers_config_then_env() {
        assert_eq!(
            resolve_api_key(Some("from-file"), Some("from-env".into())),
            Some("from-file".into())
        );
        assert_eq!(
            resolve_api_key(None, Some("from-env".into())),
            Some("from-env".into())
        );
        assert_eq!(
            resolve_api_key(Some("  "), Some("from-env".into())),
            Some("from-env".into())
        );
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    fn debug_redacts_api_key() {
        let section = ClassifierSection {
            api_key: Some("sk-secret".into()),
            ..ClassifierSection::default()
        };
        assert!(!format!("{section:?}").contains("sk-secret"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline.upload_threshold, 6);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filekeep.toml");
        std::fs::write(&path, "[watch]\ndebounce_ms = \"soon\"\n").unwrap();
        assert!(matches!(
            AgentConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
