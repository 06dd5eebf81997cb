//! Human-readable notifications for the observer (desktop UI, logs, tests).
//!
//! Notifications are fire-and-forget: sinks must never block the caller and
//! no ordering is guaranteed between different notification kinds.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FileDetected,
    FileDeleted,
    AnalysisResult,
    UploadSuccess,
    UploadError,
    WatchError,
    /// Lifecycle and decision messages ("monitoring started", "not uploading").
    Status,
}

/// A `(message, is_error)` pair plus the context it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub is_error: bool,
    /// File the notification is about, when there is one.
    pub path: Option<PathBuf>,
    /// Owner the notification belongs to (set by the upload service).
    pub owner_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn info(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            is_error: false,
            path: None,
            owner_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::info(kind, message)
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Destination for notifications, injected into the pipeline at construction.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, n: Notification) {
        let path = n.path.as_deref().map(Path::display);
        if n.is_error {
            warn!(kind = ?n.kind, path = ?path, owner = ?n.owner_id, "{}", n.message);
        } else {
            info!(kind = ?n.kind, path = ?path, owner = ?n.owner_id, "{}", n.message);
        }
    }
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _notification: Notification) {}
}

/// Collects notifications in memory. Intended for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far, in arrival order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of notifications of the given kind.
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }

    /// Messages of the given kind, in arrival order.
    pub fn messages(&self, kind: NotificationKind) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.message)
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut guard) = self.received.lock() {
            guard.push(notification);
        }
    }
}

/// Forwards notifications to a UI task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink together with the receiving end for the UI.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // A closed receiver means the UI went away; notifications are
        // fire-and-forget so there is nobody left to tell.
        let _ = self.tx.send(notification);
    }
}
