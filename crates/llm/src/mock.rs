use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use filekeep_core::FileKind;
use filekeep_extract::ExtractedContent;

use crate::classifier::Classifier;
use crate::error::ClassifierError;

/// A mock classifier that returns a fixed raw response and counts calls.
#[derive(Debug)]
pub struct MockClassifier {
    response: String,
    calls: AtomicUsize,
}

impl MockClassifier {
    /// Create a mock that answers with well-formed JSON carrying `score`.
    pub fn with_score(score: i32) -> Self {
        Self::returning(format!(
            r#"{{"summary":"classified by mock","importanceScore":{score}}}"#
        ))
    }

    /// Create a mock that answers with arbitrary raw text.
    pub fn returning(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        _content: &ExtractedContent,
        _kind: FileKind,
    ) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// A mock classifier that always returns an error.
#[derive(Debug, Clone)]
pub struct FailingClassifier {
    error_message: String,
}

impl FailingClassifier {
    /// Create a failing classifier with the given error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
        }
    }
}

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(
        &self,
        _content: &ExtractedContent,
        _kind: FileKind,
    ) -> Result<String, ClassifierError> {
        Err(ClassifierError::Api(self.error_message.clone()))
    }
}
