use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use filekeep_agent::{
    AgentConfig, AgentRuntime, AnalysisState, IntakePipeline, UploadError, UploadReceipt,
    Uploader, WatcherManager,
};
use filekeep_core::{FileEvent, MemorySink, NotificationKind};
use filekeep_extract::ContentExtractor;
use filekeep_llm::MockClassifier;
use tokio::sync::mpsc;

struct NeverUploader;

#[async_trait::async_trait]
impl Uploader for NeverUploader {
    async fn upload(&self, _path: &Path) -> Result<UploadReceipt, UploadError> {
        panic!("nothing in these tests qualifies for upload");
    }
}

fn pipeline(
    classifier: Arc<MockClassifier>,
    sink: Arc<MemorySink>,
    debounce: Duration,
) -> Arc<IntakePipeline> {
    Arc::new(
        IntakePipeline::new(
            ContentExtractor::new(),
            classifier,
            Arc::new(NeverUploader),
            sink,
        )
        .with_debounce(debounce),
    )
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn analysis_messages(sink: &MemorySink) -> Vec<String> {
    sink.messages(NotificationKind::AnalysisResult)
}

#[tokio::test(flavor = "multi_thread")]
async fn removing_a_target_cancels_its_pending_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    std::fs::create_dir_all(&inbox).unwrap();

    let classifier = Arc::new(MockClassifier::with_score(2));
    let sink = Arc::new(MemorySink::new());
    let pipeline = pipeline(classifier.clone(), sink.clone(), Duration::from_millis(800));
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = WatcherManager::new(tx, sink.clone())
        .with_poll_interval(Some(Duration::from_millis(50)))
        .with_pipeline(Arc::clone(&pipeline));
    watcher.start(vec![inbox.clone()]).unwrap();
    let run = tokio::spawn(Arc::clone(&pipeline).run(rx));

    let path = inbox.join("a.txt");
    std::fs::write(&path, "draft").unwrap();
    wait_until(|| pipeline.state(&path) == AnalysisState::PendingDebounce).await;

    let remaining = watcher.remove(&inbox).unwrap();
    assert!(remaining.is_empty());
    tokio::time::sleep(Duration::from_millis(1_600)).await;

    assert_eq!(classifier.calls(), 0);
    assert!(analysis_messages(&sink).is_empty());
    assert_eq!(pipeline.state(&path), AnalysisState::Idle);

    watcher.stop();
    drop(watcher);
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn runtime_changes_its_watch_set_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let one = dir.path().join("one");
    let two = dir.path().join("two");
    std::fs::create_dir_all(&one).unwrap();
    std::fs::create_dir_all(&two).unwrap();
    let token_path = dir.path().join("agent-token.txt");
    std::fs::write(&token_path, "tok-1\n").unwrap();

    let mut config: AgentConfig = toml::from_str("").unwrap();
    config.agent.token_path = token_path;
    config.classifier.api_key = Some("sk-test".into());
    // Nothing listens here, so every analysis that runs ends in an error.
    config.classifier.endpoint = "http://127.0.0.1:9/v1/chat/completions".into();
    config.classifier.timeout_seconds = 2;
    config.upload.endpoint = "http://127.0.0.1:9/api/file/upload".into();
    config.watch.directories = vec![one.clone()];
    config.watch.poll_interval_ms = Some(50);
    config.watch.debounce_ms = 1_500;

    let sink = Arc::new(MemorySink::new());
    let runtime = AgentRuntime::new(config, sink.clone());
    let control = runtime.control();
    let run = tokio::spawn(runtime.run());

    let targets = control.add(&two).await.unwrap();
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|t| t.active));

    std::fs::write(two.join("a.txt"), "from two").unwrap();
    wait_until(|| {
        sink.messages(NotificationKind::FileDetected)
            .iter()
            .any(|m| m.contains("a.txt"))
    })
    .await;

    let targets = control.remove(&two).await.unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].path, one);

    std::fs::write(one.join("b.txt"), "from one").unwrap();
    wait_until(|| !analysis_messages(&sink).is_empty()).await;
    tokio::time::sleep(Duration::from_millis(2_000)).await;

    let analyses = analysis_messages(&sink);
    assert_eq!(analyses.len(), 1);
    assert!(analyses[0].starts_with("Error analyzing"));
    assert!(analyses[0].contains("b.txt"));

    control.shutdown();
    run.await.unwrap().unwrap();
    assert!(control.add(&two).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn file_deleted_during_debounce_fails_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.txt");
    std::fs::write(&path, "short lived").unwrap();

    let classifier = Arc::new(MockClassifier::with_score(9));
    let sink = Arc::new(MemorySink::new());
    let pipeline = pipeline(classifier.clone(), sink.clone(), Duration::from_millis(200));
    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(Arc::clone(&pipeline).run(rx));

    tx.send(FileEvent::created(&path)).unwrap();
    std::fs::remove_file(&path).unwrap();
    tx.send(FileEvent::deleted(&path)).unwrap();

    wait_until(|| !analysis_messages(&sink).is_empty()).await;

    let failures: Vec<_> = sink
        .notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::AnalysisResult)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_error);
    assert!(failures[0].message.starts_with("Error analyzing"));
    assert_eq!(
        sink.messages(NotificationKind::FileDeleted),
        vec![format!("File deleted: {}", path.display())]
    );
    assert_eq!(classifier.calls(), 0);
    wait_until(|| pipeline.state(&path) == AnalysisState::Idle).await;

    drop(tx);
    run.await.unwrap();
}
