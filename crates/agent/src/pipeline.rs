//! The intake pipeline: debounce, extract, classify, score, decide, upload.
//!
//! Per path the pipeline moves through
//! `Idle -> PendingDebounce -> Analyzing -> Deciding -> (Uploading | Skipped) -> Idle`.
//! Analyses of the same path are serialized by a per-path lock; different
//! paths run concurrently. Every failure ends in a notification and returns
//! the path to `Idle`; nothing is retried here.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use filekeep_core::{
    ClassificationResult, ContentClass, Decision, FileEvent, FileKind,
    Notification, NotificationKind, NotificationSink, WatchTarget,
};
use filekeep_extract::{ContentExtractor, ExtractError};
use filekeep_llm::{Classifier, parse_score};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::debounce::{DEFAULT_DEBOUNCE, Debouncer};
use crate::error::IntakeError;
use crate::upload::{UploadReceipt, Uploader};

/// Default lowest score that triggers an upload.
pub const DEFAULT_UPLOAD_THRESHOLD: i32 = 6;

/// Where a path currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    PendingDebounce,
    Analyzing,
    Deciding,
    Uploading,
}

/// How one analysis ended.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// The file was sent and stored.
    Uploaded { score: i32, receipt: UploadReceipt },
    /// The upload side already had identical content.
    AlreadyStored { score: i32, receipt: UploadReceipt },
    /// Below the threshold, or the score could not be parsed.
    Skipped { score: i32 },
    Failed(IntakeError),
}

impl AnalysisOutcome {
    pub fn score(&self) -> Option<i32> {
        match self {
            Self::Uploaded { score, .. }
            | Self::AlreadyStored { score, .. }
            | Self::Skipped { score } => Some(*score),
            Self::Failed(_) => None,
        }
    }
}

pub struct IntakePipeline {
    extractor: ContentExtractor,
    classifier: Arc<dyn Classifier>,
    uploader: Arc<dyn Uploader>,
    sink: Arc<dyn NotificationSink>,
    threshold: i32,
    debouncer: Debouncer,
    fired: Mutex<Option<mpsc::UnboundedReceiver<PathBuf>>>,
    states: DashMap<PathBuf, AnalysisState>,
    locks: DashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>,
    /// Targets events are accepted from. `None` accepts every path.
    watch_targets: RwLock<Option<Vec<WatchTarget>>>,
}

impl IntakePipeline {
    pub fn new(
        extractor: ContentExtractor,
        classifier: Arc<dyn Classifier>,
        uploader: Arc<dyn Uploader>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (debouncer, fired) = Debouncer::new(DEFAULT_DEBOUNCE);
        Self {
            extractor,
            classifier,
            uploader,
            sink,
            threshold: DEFAULT_UPLOAD_THRESHOLD,
            debouncer,
            fired: Mutex::new(Some(fired)),
            states: DashMap::new(),
            locks: DashMap::new(),
            watch_targets: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        let (debouncer, fired) = Debouncer::new(delay);
        self.debouncer = debouncer;
        self.fired = Mutex::new(Some(fired));
        self
    }

    pub fn state(&self, path: &Path) -> AnalysisState {
        self.states
            .get(path)
            .map_or(AnalysisState::Idle, |s| *s)
    }

    fn set_state(&self, path: &Path, state: AnalysisState) {
        if state == AnalysisState::Idle {
            self.states.remove(path);
        } else {
            self.states.insert(path.to_path_buf(), state);
        }
    }

    fn notify(&self, notification: Notification) {
        self.sink.notify(notification);
    }

    /// Intake for one watcher event. Cheap and non-blocking: only debounce
    /// bookkeeping happens here.
    pub fn handle_event(&self, event: FileEvent) {
        if !event.triggers_analysis() {
            self.notify(
                Notification::info(
                    NotificationKind::FileDeleted,
                    format!("File deleted: {}", event.path.display()),
                )
                .with_path(&event.path),
            );
            return;
        }
        if !FileKind::is_supported(&event.path) {
            debug!(path = %event.path.display(), "ignoring unsupported file");
            return;
        }
        if !self.is_watched(&event.path) {
            debug!(path = %event.path.display(), "ignoring event outside the watch set");
            return;
        }
        self.notify(
            Notification::info(
                NotificationKind::FileDetected,
                format!("File {}: {}", event.kind, event.path.display()),
            )
            .with_path(&event.path),
        );
        if self.state(&event.path) == AnalysisState::Idle {
            self.set_state(&event.path, AnalysisState::PendingDebounce);
        }
        self.debouncer.schedule(event.path);
    }

    /// Restrict intake to files inside `targets`.
    ///
    /// Pending timers for paths no target contains any more are cancelled and
    /// their state returns to `Idle`. Analyses already running are left to
    /// finish. Returns the number of cancelled timers.
    pub fn set_watch_targets(&self, targets: &[WatchTarget]) -> usize {
        let covered = |path: &Path| targets.iter().any(|t| t.contains(path));

        let cancelled = self.debouncer.cancel_where(|path| !covered(path));
        self.states.retain(|path, state| {
            *state != AnalysisState::PendingDebounce || covered(path)
        });
        if cancelled > 0 {
            info!(cancelled, "dropped pending analyses outside the watch set");
        }
        if let Ok(mut slot) = self.watch_targets.write() {
            *slot = Some(targets.to_vec());
        }
        cancelled
    }

    fn is_watched(&self, path: &Path) -> bool {
        self.watch_targets
            .read()
            .map(|targets| {
                targets
                    .as_ref()
                    .is_none_or(|targets| targets.iter().any(|t| t.contains(path)))
            })
            .unwrap_or(true)
    }

    /// Drive the pipeline until `events` closes. Each debounced path is
    /// analyzed on its own task.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<FileEvent>) {
        let Some(mut fired) = self.fired.lock().ok().and_then(|mut f| f.take()) else {
            warn!("intake pipeline is already running");
            return;
        };
        info!("intake pipeline running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(path) = fired.recv() => {
                    // The target may have been removed after the timer fired.
                    if !self.is_watched(&path) {
                        debug!(path = %path.display(), "skipping analysis outside the watch set");
                        self.states.remove_if(&path, |_, s| *s == AnalysisState::PendingDebounce);
                        continue;
                    }
                    let pipeline = Arc::clone(&self);
                    tokio::spawn(async move {
                        pipeline.analyze(&path).await;
                    });
                }
            }
        }
        info!("intake pipeline stopped");
    }

    /// Run extraction, classification and the upload decision for one file.
    pub async fn analyze(&self, path: &Path) -> AnalysisOutcome {
        let lock = Arc::clone(&self.locks.entry(path.to_path_buf()).or_default());
        let outcome = {
            let _guard = lock.lock().await;
            self.set_state(path, AnalysisState::Analyzing);
            let outcome = self.analyze_locked(path).await;
            let next = if self.debouncer.is_pending(path) {
                AnalysisState::PendingDebounce
            } else {
                AnalysisState::Idle
            };
            self.set_state(path, next);
            outcome
        };
        drop(lock);
        self.locks
            .remove_if(path, |_, l| Arc::strong_count(l) == 1);
        outcome
    }

    async fn analyze_locked(&self, path: &Path) -> AnalysisOutcome {
        let result = match self.classify(path).await {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "analysis failed");
                self.notify(
                    Notification::error(
                        NotificationKind::AnalysisResult,
                        format!("Error analyzing {}: {e}", path.display()),
                    )
                    .with_path(path),
                );
                return AnalysisOutcome::Failed(e);
            }
        };
        self.notify(
            Notification::info(
                NotificationKind::AnalysisResult,
                format!("Analysis of {}: {}", path.display(), result.raw_model_output),
            )
            .with_path(path),
        );

        self.set_state(path, AnalysisState::Deciding);
        let score = result.importance_score;
        match result.decide(self.threshold) {
            Decision::Upload => {
                self.notify(
                    Notification::info(
                        NotificationKind::Status,
                        format!("Importance score is {score}. Uploading {}", path.display()),
                    )
                    .with_path(path),
                );
                self.set_state(path, AnalysisState::Uploading);
                self.upload(path, score).await
            }
            Decision::Skip { notify } => {
                if notify {
                    self.notify(
                        Notification::info(
                            NotificationKind::Status,
                            format!(
                                "Importance score for {} is {score}, not uploading",
                                path.display()
                            ),
                        )
                        .with_path(path),
                    );
                } else {
                    debug!(path = %path.display(), "no score in classifier output, skipping");
                }
                AnalysisOutcome::Skipped { score }
            }
        }
    }

    async fn classify(&self, path: &Path) -> Result<ClassificationResult, IntakeError> {
        let kind = FileKind::from_path(path)
            .ok_or_else(|| ExtractError::UnsupportedType(path.to_path_buf()))?;
        let content = self.extractor.extract(path).await?;
        let raw = self.classifier.classify(&content, kind).await?;
        let importance_score = parse_score(&raw);
        debug!(path = %path.display(), importance_score, "file classified");
        Ok(ClassificationResult {
            kind: ContentClass::from(kind),
            raw_model_output: raw,
            importance_score,
        })
    }

    async fn upload(&self, path: &Path, score: i32) -> AnalysisOutcome {
        match self.uploader.upload(path).await {
            Ok(receipt) if receipt.existing => {
                info!(path = %path.display(), url = ?receipt.url, "file already stored");
                self.notify(
                    Notification::info(NotificationKind::Status, receipt.message.clone())
                        .with_path(path),
                );
                AnalysisOutcome::AlreadyStored { score, receipt }
            }
            Ok(receipt) => {
                let location = receipt.url.as_deref().unwrap_or("unknown location");
                self.notify(
                    Notification::info(
                        NotificationKind::UploadSuccess,
                        format!("File uploaded: {} ({location})", path.display()),
                    )
                    .with_path(path),
                );
                AnalysisOutcome::Uploaded { score, receipt }
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "upload failed");
                self.notify(
                    Notification::error(
                        NotificationKind::UploadError,
                        format!("Error uploading file: {} - {e}", path.display()),
                    )
                    .with_path(path),
                );
                AnalysisOutcome::Failed(e.into())
            }
        }
    }
}

impl std::fmt::Debug for IntakePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakePipeline")
            .field("extractor", &self.extractor)
            .field("classifier", &self.classifier)
            .field("threshold", &self.threshold)
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}
