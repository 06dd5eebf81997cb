use serde::{Deserialize, Serialize};

use crate::file::FileKind;

/// Score returned when the model output could not be interpreted.
pub const UNPARSED_SCORE: i32 = -1;

/// Whether the classifier was given text or an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    Text,
    Image,
}

impl From<FileKind> for ContentClass {
    fn from(kind: FileKind) -> Self {
        if kind.is_text_bearing() {
            Self::Text
        } else {
            Self::Image
        }
    }
}

/// Outcome of classifying one file. Lives only as long as the upload decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub kind: ContentClass,
    pub raw_model_output: String,
    /// Importance in `1..=10`, or [`UNPARSED_SCORE`].
    pub importance_score: i32,
}

impl ClassificationResult {
    /// Decide what to do with the file at the given upload threshold.
    pub fn decide(&self, threshold: i32) -> Decision {
        Decision::for_score(self.importance_score, threshold)
    }
}

/// What the pipeline does after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Upload,
    Skip {
        /// `false` for the unparsed sentinel: an unreadable answer is not a
        /// low-importance verdict and is not reported as one.
        notify: bool,
    },
}

impl Decision {
    /// Scores in `threshold..=10` upload; everything else is skipped.
    pub fn for_score(score: i32, threshold: i32) -> Self {
        if score == UNPARSED_SCORE {
            Self::Skip { notify: false }
        } else if (threshold..=10).contains(&score) {
            Self::Upload
        } else {
            Self::Skip { notify: true }
        }
    }
}
