//! Per-path debouncing.
//!
//! Each path has at most one pending timer. Scheduling a path that already
//! has one aborts the old timer and starts a new one under the same map
//! entry, so cancel-and-replace is atomic with respect to other events for
//! that path. A timer only fires if it is still the current one for its path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default quiet period.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct PendingAnalysis {
    generation: u64,
    timer: JoinHandle<()>,
}

/// Coalesces bursts of events per path into one delayed trigger.
///
/// Fired paths are delivered on the receiver returned by [`Debouncer::new`].
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<DashMap<PathBuf, PendingAnalysis>>,
    generation: AtomicU64,
    fired: mpsc::UnboundedSender<PathBuf>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            fired,
        };
        (debouncer, rx)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the timer for `path`. Must be called inside a tokio runtime.
    pub fn schedule(&self, path: PathBuf) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        match self.pending.entry(path) {
            Entry::Occupied(mut entry) => {
                entry.get().timer.abort();
                trace!(path = %entry.key().display(), "debounce timer replaced");
                let timer = self.spawn_timer(entry.key().clone(), generation);
                entry.insert(PendingAnalysis { generation, timer });
            }
            Entry::Vacant(entry) => {
                let timer = self.spawn_timer(entry.key().clone(), generation);
                entry.insert(PendingAnalysis { generation, timer });
            }
        }
    }

    fn spawn_timer(&self, path: PathBuf, generation: u64) -> JoinHandle<()> {
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let fired = self.fired.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if pending
                .remove_if(&path, |_, p| p.generation == generation)
                .is_some()
            {
                debug!(path = %path.display(), "debounce window elapsed");
                // A closed receiver means the pipeline is gone.
                let _ = fired.send(path);
            }
        })
    }

    /// Drop the pending timer for `path`. Returns `true` if one existed.
    pub fn cancel(&self, path: &Path) -> bool {
        self.pending
            .remove(path)
            .map(|(_, p)| p.timer.abort())
            .is_some()
    }

    /// Drop every pending timer whose path matches `predicate`.
    pub fn cancel_where(&self, mut predicate: impl FnMut(&Path) -> bool) -> usize {
        let mut cancelled = 0;
        self.pending.retain(|path, p| {
            if predicate(path) {
                p.timer.abort();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn single_event_fires_after_delay() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_secs(2));
        debouncer.schedule(PathBuf::from("/w/a.txt"));
        assert!(debouncer.is_pending(Path::new("/w/a.txt")));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, PathBuf::from("/w/a.txt"));
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paths_are_independent() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_secs(2));
        debouncer.schedule(PathBuf::from("/w/a.txt"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.schedule(PathBuf::from("/w/b.txt"));

        assert_eq!(rx.recv().await.unwrap(), PathBuf::from("/w/a.txt"));
        assert_eq!(rx.recv().await.unwrap(), PathBuf::from("/w/b.txt"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_secs(2));
        debouncer.schedule(PathBuf::from("/w/a.txt"));
        assert!(debouncer.cancel(Path::new("/w/a.txt")));
        assert!(!debouncer.cancel(Path::new("/w/a.txt")));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_where_only_touches_matching_paths() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_secs(2));
        debouncer.schedule(PathBuf::from("/w/one/a.txt"));
        debouncer.schedule(PathBuf::from("/w/one/sub/b.txt"));
        debouncer.schedule(PathBuf::from("/w/two/c.txt"));

        assert_eq!(debouncer.cancel_where(|p| p.starts_with("/w/one")), 2);

        assert_eq!(rx.recv().await.unwrap(), PathBuf::from("/w/two/c.txt"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
