pub mod classifier;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod prompt;
pub mod score;

pub use classifier::Classifier;
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use http::HttpClassifier;
pub use mock::{FailingClassifier, MockClassifier};
pub use prompt::prompt_for;
pub use score::parse_score;
