use async_trait::async_trait;
use filekeep_core::FileKind;
use filekeep_extract::ExtractedContent;

use crate::error::ClassifierError;

/// Sends extracted content to an inference backend together with a
/// kind-specific instruction and returns the model's raw text.
///
/// The returned text is untrusted: the instruction asks for a JSON object but
/// nothing enforces it. Feed it to [`crate::parse_score`].
#[async_trait]
pub trait Classifier: Send + Sync + std::fmt::Debug {
    async fn classify(
        &self,
        content: &ExtractedContent,
        kind: FileKind,
    ) -> Result<String, ClassifierError>;
}
