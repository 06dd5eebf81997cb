use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use filekeep_agent::{AgentToken, IntakePipeline, LocalUploader, WatcherManager};
use filekeep_core::{BackendKind, FileEvent, FileKind, MemorySink, NotificationKind};
use filekeep_extract::{ContentExtractor, ExtractedContent, TRUNCATION_MARKER};
use filekeep_index::{FileIndex, MemoryFileIndex, hash_bytes};
use filekeep_llm::{Classifier, ClassifierError};
use filekeep_storage::testing::RecordingFactory;
use filekeep_storage::{AccountStore, BackendCredential, MemoryAccountStore, UploadService};
use tokio::sync::mpsc;

const OWNER: &str = "owner-1";
const TOKEN: &str = "agent-token-1";

/// Answers every request with a fenced JSON verdict and keeps the text it
/// was given.
#[derive(Debug)]
struct CapturingClassifier {
    score: i32,
    seen: Mutex<Vec<String>>,
}

impl CapturingClassifier {
    fn new(score: i32) -> Self {
        Self {
            score,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn last_text(&self) -> String {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Classifier for CapturingClassifier {
    async fn classify(
        &self,
        content: &ExtractedContent,
        _kind: FileKind,
    ) -> Result<String, ClassifierError> {
        self.seen
            .lock()
            .unwrap()
            .push(content.as_text().unwrap_or_default().to_owned());
        Ok(format!(
            "```json\n{{\"summary\": \"quarterly report\", \"importanceScore\": {}}}\n```",
            self.score
        ))
    }
}

struct Agent {
    pipeline: Arc<IntakePipeline>,
    classifier: Arc<CapturingClassifier>,
    index: Arc<MemoryFileIndex>,
    factory: RecordingFactory,
    sink: Arc<MemorySink>,
    staging: PathBuf,
}

async fn agent(root: &Path, score: i32, debounce: Duration) -> Agent {
    let index = Arc::new(MemoryFileIndex::new());
    let accounts = Arc::new(MemoryAccountStore::new());
    accounts.register(OWNER, TOKEN);
    accounts
        .set_credentials(
            OWNER,
            BackendCredential::Cloudinary {
                cloud_name: "demo".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
        )
        .await
        .unwrap();
    let factory = RecordingFactory::new();
    let service = UploadService::new(index.clone(), accounts, Arc::new(factory.clone()));

    let staging = root.join("staging");
    let uploader = LocalUploader::new(
        Arc::new(service),
        AgentToken::new(TOKEN).unwrap(),
        &staging,
    );
    let classifier = Arc::new(CapturingClassifier::new(score));
    let sink = Arc::new(MemorySink::new());
    let pipeline = Arc::new(
        IntakePipeline::new(
            ContentExtractor::new(),
            classifier.clone(),
            Arc::new(uploader),
            sink.clone(),
        )
        .with_debounce(debounce),
    );
    Agent {
        pipeline,
        classifier,
        index,
        factory,
        sink,
        staging,
    }
}

/// Poll until `done` holds, failing after ten seconds.
async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn already_exists(sink: &MemorySink) -> usize {
    sink.messages(NotificationKind::Status)
        .iter()
        .filter(|m| m.contains("already exists"))
        .count()
}

#[tokio::test(flavor = "multi_thread")]
async fn important_text_file_is_truncated_classified_and_uploaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    std::fs::create_dir_all(&inbox).unwrap();
    let path = inbox.join("report.txt");
    let body = "0123456789".repeat(3_000);
    std::fs::write(&path, &body).unwrap();

    let agent = agent(dir.path(), 8, Duration::from_millis(200)).await;
    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(Arc::clone(&agent.pipeline).run(rx));

    tx.send(FileEvent::created(&path)).unwrap();
    tx.send(FileEvent::modified(&path)).unwrap();
    wait_until(|| agent.sink.count(NotificationKind::UploadSuccess) == 1).await;

    assert_eq!(agent.classifier.calls(), 1);
    let text = agent.classifier.last_text();
    assert_eq!(
        text.chars().count(),
        25_000 + TRUNCATION_MARKER.chars().count()
    );
    assert!(text.ends_with(TRUNCATION_MARKER));
    assert!(body.starts_with(&text[..25_000]));

    assert_eq!(agent.factory.upload_count(), 1);
    let records = agent.index.list(OWNER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "report.txt");
    assert_eq!(records[0].backend, BackendKind::Cloudinary);
    assert_eq!(records[0].size_bytes, 30_000);
    assert_eq!(records[0].content_hash, hash_bytes(body.as_bytes()));
    assert_eq!(std::fs::read_dir(&agent.staging).unwrap().count(), 0);
    assert!(path.exists());

    // Same bytes again: dedup short-circuits before any backend call.
    tx.send(FileEvent::modified(&path)).unwrap();
    wait_until(|| already_exists(&agent.sink) == 1).await;

    assert_eq!(agent.classifier.calls(), 2);
    assert_eq!(agent.factory.upload_count(), 1);
    assert_eq!(agent.sink.count(NotificationKind::UploadSuccess), 1);
    assert_eq!(agent.index.list(OWNER).await.unwrap().len(), 1);
    assert_eq!(std::fs::read_dir(&agent.staging).unwrap().count(), 0);

    drop(tx);
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn edited_file_replaces_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "first draft").unwrap();

    let agent = agent(dir.path(), 7, Duration::from_millis(100)).await;
    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(Arc::clone(&agent.pipeline).run(rx));

    tx.send(FileEvent::created(&path)).unwrap();
    wait_until(|| agent.sink.count(NotificationKind::UploadSuccess) == 1).await;

    std::fs::write(&path, "second draft").unwrap();
    tx.send(FileEvent::modified(&path)).unwrap();
    wait_until(|| agent.sink.count(NotificationKind::UploadSuccess) == 2).await;

    let records = agent.index.list(OWNER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content_hash, hash_bytes(b"second draft"));
    assert_eq!(agent.factory.upload_count(), 2);

    drop(tx);
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unimportant_file_is_not_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shopping.txt");
    std::fs::write(&path, "milk, eggs").unwrap();

    let agent = agent(dir.path(), 3, Duration::from_millis(100)).await;
    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(Arc::clone(&agent.pipeline).run(rx));

    tx.send(FileEvent::created(&path)).unwrap();
    wait_until(|| {
        agent
            .sink
            .messages(NotificationKind::Status)
            .iter()
            .any(|m| m.ends_with("is 3, not uploading"))
    })
    .await;

    assert_eq!(agent.factory.upload_count(), 0);
    assert!(agent.index.is_empty());

    drop(tx);
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn watched_directory_feeds_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    std::fs::create_dir_all(&inbox).unwrap();

    let agent = agent(dir.path(), 9, Duration::from_millis(300)).await;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = WatcherManager::new(tx, agent.sink.clone())
        .with_poll_interval(Some(Duration::from_millis(50)));
    let targets = watcher.start(vec![inbox.clone()]).unwrap();
    assert!(targets[0].active);
    let run = tokio::spawn(Arc::clone(&agent.pipeline).run(rx));

    std::fs::write(inbox.join("id-card.txt"), "ID 0042").unwrap();
    std::fs::write(inbox.join("installer.exe"), "MZ").unwrap();
    wait_until(|| agent.sink.count(NotificationKind::UploadSuccess) == 1).await;

    let records = agent.index.list(OWNER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "id-card.txt");

    watcher.stop();
    drop(watcher);
    run.await.unwrap();
}
