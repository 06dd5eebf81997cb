use std::time::Duration;

use async_trait::async_trait;
use filekeep_core::FileKind;
use filekeep_extract::ExtractedContent;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::classifier::Classifier;
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::prompt::prompt_for;

/// Classifier backed by an OpenAI-compatible chat completions API.
///
/// Text goes in a user message after a system message carrying the
/// instruction. Images are sent as a `data:` URI `image_url` part to the
/// configured vision model.
#[derive(Debug)]
pub struct HttpClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl HttpClassifier {
    /// Create a new HTTP classifier with the given configuration.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        if config.api_key.trim().is_empty() {
            return Err(ClassifierError::Configuration("API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ClassifierError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_request(&self, content: &ExtractedContent, kind: FileKind) -> Value {
        let prompt = prompt_for(kind);
        let (model, messages) = match content {
            ExtractedContent::Text { text, .. } => (
                &self.config.model,
                json!([
                    { "role": "system", "content": prompt },
                    { "role": "user", "content": text },
                ]),
            ),
            ExtractedContent::Image {
                mime_type,
                data_base64,
            } => (
                &self.config.vision_model,
                json!([{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:{mime_type};base64,{data_base64}") },
                        },
                    ],
                }]),
            ),
        };

        json!({
            "model": model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        })
    }

    /// Pull the assistant message out of a chat completions response.
    fn message_content(response: &Value) -> Result<String, ClassifierError> {
        response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                ClassifierError::ParseError(format!("unexpected response format: {response}"))
            })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    #[instrument(skip(self, content), fields(kind = %kind))]
    async fn classify(
        &self,
        content: &ExtractedContent,
        kind: FileKind,
    ) -> Result<String, ClassifierError> {
        let request_body = self.build_request(content, kind);

        debug!(endpoint = %self.config.endpoint, "sending classification request");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.config.timeout_seconds)
                } else {
                    ClassifierError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "inference API returned error");
            return Err(ClassifierError::Api(format!("HTTP {status}: {body}")));
        }

        let response_json: Value = response.json().await.map_err(|e| {
            ClassifierError::ParseError(format!("failed to parse API response: {e}"))
        })?;

        Self::message_content(&response_json)
    }
}

#[cfg(test)]
mod tests {
    use filekeep_core::testing::MockHttpServer;

    use super::*;

    fn endpoint(server: &MockHttpServer) -> String {
        format!("{}/v1/chat/completions", server.base_url)
    }

    fn completion(content: &str) -> String {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
            .to_string()
    }

    fn text_content(text: &str) -> ExtractedContent {
        ExtractedContent::Text {
            kind: FileKind::Text,
            text: text.into(),
            truncated: false,
        }
    }

    fn classifier(endpoint: &str) -> HttpClassifier {
        let config = ClassifierConfig::new(endpoint, "text-model", "sk-test")
            .with_vision_model("vision-model")
            .with_timeout(5);
        HttpClassifier::new(config).unwrap()
    }

    #[test]
    fn empty_api_key_is_configuration_error() {
        let err = HttpClassifier::new(ClassifierConfig::new("http://x", "m", "  ")).unwrap_err();
        assert!(matches!(err, ClassifierError::Configuration(_)));
    }

    #[test]
    fn text_request_shape() {
        let c = classifier("http://localhost/v1/chat/completions");
        let body = c.build_request(&text_content("hello"), FileKind::Pdf);
        assert_eq!(body["model"], "text-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .contains("PDF document")
        );
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn image_request_uses_vision_model_and_data_uri() {
        let c = classifier("http://localhost/v1/chat/completions");
        let content = ExtractedContent::Image {
            mime_type: "image/png".into(),
            data_base64: "AAAA".into(),
        };
        let body = c.build_request(&content, FileKind::Image);
        assert_eq!(body["model"], "vision-model");
        let parts = &body["messages"][0]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn message_content_rejects_unexpected_shape() {
        let err = HttpClassifier::message_content(&json!({ "error": "nope" })).unwrap_err();
        assert!(matches!(err, ClassifierError::ParseError(_)));
    }

    #[tokio::test]
    async fn classify_returns_raw_model_text() {
        let server = MockHttpServer::start().await;
        let c = classifier(&endpoint(&server));
        let raw = "```json\n{\"summary\":\"invoice\",\"importanceScore\":8}\n```";
        let reply = completion(raw);

        let server_handle = tokio::spawn(async move { server.respond_once(200, &reply).await });
        let result = c.classify(&text_content("Invoice #42"), FileKind::Text).await;
        let request = server_handle.await.unwrap();

        assert_eq!(result.unwrap(), raw);
        assert_eq!(request.path(), "/v1/chat/completions");
        assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
        let sent = request.body_text();
        assert!(sent.contains("Invoice #42"));
        assert!(sent.contains("text-model"));
    }

    #[tokio::test]
    async fn classify_api_error() {
        let server = MockHttpServer::start().await;
        let c = classifier(&endpoint(&server));

        let server_handle = tokio::spawn(async move {
            server
                .respond_once(500, r#"{"error":"overloaded"}"#)
                .await
        });
        let err = c
            .classify(&text_content("x"), FileKind::Text)
            .await
            .unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, ClassifierError::Api(ref m) if m.contains("500")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn classify_connection_refused() {
        let c = classifier("http://127.0.0.1:1/v1/chat/completions");
        let err = c
            .classify(&text_content("x"), FileKind::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Http(_)));
    }
}
