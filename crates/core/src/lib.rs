pub mod classification;
pub mod error;
pub mod event;
pub mod file;
pub mod hash;
pub mod notification;
pub mod record;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classification::{ClassificationResult, ContentClass, Decision, UNPARSED_SCORE};
pub use error::CoreError;
pub use event::{FileEvent, FileEventKind, WatchTarget};
pub use file::{FileKind, SUPPORTED_EXTENSIONS};
pub use hash::ContentHash;
pub use notification::{
    ChannelSink, LogSink, MemorySink, NoopSink, Notification, NotificationKind, NotificationSink,
};
pub use record::{BackendKind, StoredFile};
