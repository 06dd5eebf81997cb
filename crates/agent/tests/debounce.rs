use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use filekeep_agent::{AnalysisState, Debouncer, IntakePipeline, UploadReceipt, UploadError, Uploader};
use filekeep_core::{FileEvent, MemorySink, NotificationKind};
use filekeep_extract::ContentExtractor;
use filekeep_llm::MockClassifier;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn burst_of_events_fires_once_after_the_last() {
    let (debouncer, mut fired) = Debouncer::new(Duration::from_secs(2));
    let path = PathBuf::from("/watched/scan.pdf");

    let start = Instant::now();
    for _ in 0..10 {
        debouncer.schedule(path.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let last_event = start + Duration::from_millis(900);

    let got = fired.recv().await.unwrap();
    assert_eq!(got, path);
    assert!(Instant::now() >= last_event + Duration::from_secs(2));
    assert!(!debouncer.is_pending(&path));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(fired.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn separate_paths_fire_independently() {
    let (debouncer, mut fired) = Debouncer::new(Duration::from_secs(2));
    debouncer.schedule(PathBuf::from("/watched/a.txt"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    debouncer.schedule(PathBuf::from("/watched/b.txt"));

    assert_eq!(fired.recv().await.unwrap(), PathBuf::from("/watched/a.txt"));
    assert_eq!(fired.recv().await.unwrap(), PathBuf::from("/watched/b.txt"));
    assert_eq!(debouncer.pending_count(), 0);
}

struct NeverUploader;

#[async_trait::async_trait]
impl Uploader for NeverUploader {
    async fn upload(&self, _path: &std::path::Path) -> Result<UploadReceipt, UploadError> {
        panic!("a low score must not upload");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rapid_modifications_are_classified_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("draft.txt");
    std::fs::write(&path, "work in progress").unwrap();

    let classifier = Arc::new(MockClassifier::with_score(2));
    let sink = Arc::new(MemorySink::new());
    let pipeline = Arc::new(
        IntakePipeline::new(
            ContentExtractor::new(),
            classifier.clone(),
            Arc::new(NeverUploader),
            sink.clone(),
        )
        .with_debounce(Duration::from_millis(400)),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(Arc::clone(&pipeline).run(rx));

    tx.send(FileEvent::created(&path)).unwrap();
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(FileEvent::modified(&path)).unwrap();
    }
    assert_eq!(pipeline.state(&path), AnalysisState::PendingDebounce);

    tokio::time::timeout(Duration::from_secs(10), async {
        while sink.count(NotificationKind::AnalysisResult) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(classifier.calls(), 1);
    assert_eq!(sink.count(NotificationKind::AnalysisResult), 1);
    assert_eq!(sink.count(NotificationKind::FileDetected), 5);
    assert_eq!(pipeline.state(&path), AnalysisState::Idle);

    drop(tx);
    run.await.unwrap();
}
