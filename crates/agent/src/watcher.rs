//! Filesystem watcher over a mutable set of watch targets.
//!
//! The underlying `notify` watcher is never updated incrementally: every
//! change to the target set stops it and starts a fresh one over the new set.
//! Event intake only translates and forwards; it never blocks on analysis.
//! When attached to an [`IntakePipeline`], every change to the target set is
//! pushed to it so pending analyses outside the new set are dropped.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filekeep_core::{FileEvent, Notification, NotificationKind, NotificationSink, WatchTarget};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::pipeline::IntakePipeline;

/// Owns the current [`WatchTarget`] set and the OS watch over it.
pub struct WatcherManager {
    targets: Vec<WatchTarget>,
    watcher: Option<Box<dyn Watcher + Send>>,
    events: mpsc::UnboundedSender<FileEvent>,
    sink: Arc<dyn NotificationSink>,
    poll_interval: Option<Duration>,
    include_hidden: bool,
    pipeline: Option<Arc<IntakePipeline>>,
}

impl WatcherManager {
    /// Create a stopped manager forwarding events to `events`.
    pub fn new(events: mpsc::UnboundedSender<FileEvent>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            targets: Vec::new(),
            watcher: None,
            events,
            sink,
            poll_interval: None,
            include_hidden: false,
            pipeline: None,
        }
    }

    /// Poll at `interval` instead of subscribing to native OS events.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_hidden_files(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Keep `pipeline`'s watch scope in step with the target set.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Arc<IntakePipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn targets(&self) -> &[WatchTarget] {
        &self.targets
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Replace the target set and (re)start watching.
    pub fn start(
        &mut self,
        directories: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Vec<WatchTarget>, WatchError> {
        self.targets.clear();
        for dir in directories {
            if !self.targets.iter().any(|t| t.path == dir) {
                self.targets.push(WatchTarget::new(dir));
            }
        }
        self.restart()?;
        Ok(self.targets.clone())
    }

    /// Add a directory. Adding a known directory leaves the watch untouched.
    pub fn add(&mut self, directory: impl Into<PathBuf>) -> Result<Vec<WatchTarget>, WatchError> {
        let directory = directory.into();
        if !self.targets.iter().any(|t| t.path == directory) {
            self.targets.push(WatchTarget::new(directory));
            self.restart()?;
        }
        Ok(self.targets.clone())
    }

    /// Remove a directory and restart the watch over the remaining set.
    /// Pending analyses for files no remaining target covers are cancelled.
    pub fn remove(&mut self, directory: &Path) -> Result<Vec<WatchTarget>, WatchError> {
        let before = self.targets.len();
        self.targets.retain(|t| t.path != directory);
        if self.targets.len() != before {
            self.restart()?;
        }
        Ok(self.targets.clone())
    }

    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            info!("file watcher stopped");
        }
        for target in &mut self.targets {
            target.active = false;
        }
    }

    fn restart(&mut self) -> Result<(), WatchError> {
        self.stop();
        if let Some(pipeline) = &self.pipeline {
            pipeline.set_watch_targets(&self.targets);
        }

        let roots: Vec<PathBuf> = self.targets.iter().map(|t| t.path.clone()).collect();
        let handler = event_handler(
            self.events.clone(),
            Arc::clone(&self.sink),
            roots,
            self.include_hidden,
        );
        let mut watcher: Box<dyn Watcher + Send> = match self.poll_interval {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                notify::Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(RecommendedWatcher::new(handler, notify::Config::default())?),
        };

        for target in &mut self.targets {
            if !target.path.is_dir() {
                warn!(path = %target.path.display(), "watch directory does not exist");
                self.sink.notify(
                    Notification::error(
                        NotificationKind::WatchError,
                        format!("Watcher error: {} is not a directory", target.path.display()),
                    )
                    .with_path(&target.path),
                );
                continue;
            }
            match watcher.watch(&target.path, RecursiveMode::Recursive) {
                Ok(()) => target.active = true,
                Err(e) => {
                    warn!(path = %target.path.display(), error = %e, "failed to watch directory");
                    self.sink.notify(
                        Notification::error(
                            NotificationKind::WatchError,
                            format!("Watcher error: {e}"),
                        )
                        .with_path(&target.path),
                    );
                }
            }
        }

        let active = self.targets.iter().filter(|t| t.active).count();
        info!(active, total = self.targets.len(), "file watcher started");
        self.watcher = Some(watcher);
        Ok(())
    }
}

impl std::fmt::Debug for WatcherManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherManager")
            .field("targets", &self.targets)
            .field("running", &self.watcher.is_some())
            .field("poll_interval", &self.poll_interval)
            .field("include_hidden", &self.include_hidden)
            .finish_non_exhaustive()
    }
}

fn event_handler(
    events: mpsc::UnboundedSender<FileEvent>,
    sink: Arc<dyn NotificationSink>,
    roots: Vec<PathBuf>,
    include_hidden: bool,
) -> impl FnMut(notify::Result<notify::Event>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            for file_event in translate(&event) {
                if !include_hidden && is_hidden(&file_event.path, &roots) {
                    continue;
                }
                debug!(path = %file_event.path.display(), kind = %file_event.kind, "file event");
                // The pipeline has shut down when the receiver is gone.
                let _ = events.send(file_event);
            }
        }
        Err(e) => {
            warn!(error = %e, "filesystem watcher error");
            sink.notify(Notification::error(
                NotificationKind::WatchError,
                format!("Watcher error: {e}"),
            ));
        }
    }
}

/// Map a raw `notify` event to pipeline events. Renames become a delete of
/// the old name and a create of the new one; access and metadata changes
/// are dropped.
fn translate(event: &notify::Event) -> Vec<FileEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.iter().map(FileEvent::created).collect(),
        EventKind::Remove(_) => event.paths.iter().map(FileEvent::deleted).collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(FileEvent::deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(FileEvent::created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![FileEvent::deleted(from), FileEvent::created(to)],
            _ => Vec::new(),
        },
        EventKind::Modify(_) => event.paths.iter().map(FileEvent::modified).collect(),
        _ => Vec::new(),
    }
}

/// `true` if any component below the watch root starts with a dot.
fn is_hidden(path: &Path, roots: &[PathBuf]) -> bool {
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use filekeep_core::{FileEventKind, MemorySink};
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    use super::*;

    fn raw(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    fn kinds(events: &[FileEvent]) -> Vec<FileEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn translate_create_modify_remove() {
        let created = translate(&raw(EventKind::Create(CreateKind::File), &["/w/a.txt"]));
        assert_eq!(kinds(&created), vec![FileEventKind::Created]);

        let modified = translate(&raw(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/w/a.txt"],
        ));
        assert_eq!(kinds(&modified), vec![FileEventKind::Modified]);

        let removed = translate(&raw(EventKind::Remove(RemoveKind::File), &["/w/a.txt"]));
        assert_eq!(kinds(&removed), vec![FileEventKind::Deleted]);
    }

    #[test]
    fn translate_drops_metadata_and_access() {
        assert!(
            translate(&raw(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                &["/w/a.txt"],
            ))
            .is_empty()
        );
        assert!(
            translate(&raw(
                EventKind::Access(notify::event::AccessKind::Read),
                &["/w/a.txt"]
            ))
            .is_empty()
        );
    }

    #[test]
    fn translate_rename_both() {
        let events = translate(&raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/a.tmp", "/w/a.pdf"],
        ));
        assert_eq!(
            kinds(&events),
            vec![FileEventKind::Deleted, FileEventKind::Created]
        );
        assert_eq!(events[1].path, PathBuf::from("/w/a.pdf"));
    }

    #[test]
    fn hidden_paths_are_relative_to_root() {
        let roots = vec![PathBuf::from("/home/u/.inbox")];
        assert!(!is_hidden(Path::new("/home/u/.inbox/a.txt"), &roots));
        assert!(is_hidden(Path::new("/home/u/.inbox/.a.txt"), &roots));
        assert!(is_hidden(Path::new("/home/u/.inbox/.git/b.txt"), &roots));
    }

    #[tokio::test]
    async fn missing_directory_is_inactive_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = Arc::new(MemorySink::new());
        let mut manager = WatcherManager::new(tx, sink.clone());

        let targets = manager
            .start(vec![dir.path().to_path_buf(), dir.path().join("missing")])
            .unwrap();

        assert!(targets[0].active);
        assert!(!targets[1].active);
        assert_eq!(sink.count(NotificationKind::WatchError), 1);
        assert!(manager.is_running());
    }

    #[tokio::test]
    async fn add_and_remove_restart_with_new_set() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = WatcherManager::new(tx, Arc::new(MemorySink::new()));

        manager.start(vec![one.path().to_path_buf()]).unwrap();
        let targets = manager.add(two.path()).unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.active));

        let targets = manager.add(two.path()).unwrap();
        assert_eq!(targets.len(), 2);

        let targets = manager.remove(one.path()).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].path, two.path());
    }

    #[tokio::test]
    async fn poll_watcher_reports_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = WatcherManager::new(tx, Arc::new(MemorySink::new()))
            .with_poll_interval(Some(Duration::from_millis(50)));
        manager.start(vec![dir.path().to_path_buf()]).unwrap();

        std::fs::write(dir.path().join(".hidden.txt"), b"x").unwrap();
        let visible = dir.path().join("invoice.txt");
        std::fs::write(&visible, b"total: 10").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let event = rx.recv().await.unwrap();
                if event.kind == FileEventKind::Created {
                    return event;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(event.path.file_name(), visible.file_name());
        manager.stop();
    }
}
