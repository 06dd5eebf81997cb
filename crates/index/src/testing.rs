use chrono::{Duration, Utc};
use filekeep_core::{BackendKind, ContentHash, StoredFile};
use uuid::Uuid;

use crate::error::IndexError;
use crate::index::{FileIndex, InsertOutcome};

/// Build a record whose content hash is derived from `seed`.
///
/// Two fixtures with the same `seed` share a content hash.
pub fn record_fixture(owner_id: &str, name: &str, seed: u8) -> StoredFile {
    let id = Uuid::now_v7();
    StoredFile {
        id,
        owner_id: owner_id.to_owned(),
        name: name.to_owned(),
        size_bytes: 1024,
        mime_type: "application/octet-stream".to_owned(),
        backend: BackendKind::Cloudinary,
        url: format!("https://files.example.com/{id}"),
        remote_id: format!("remote-{id}"),
        content_hash: ContentHash::from_digest(&[seed; 32]),
        created_at: Utc::now(),
    }
}

/// Run the full file index conformance test suite.
///
/// Call this from your index's test module with a fresh instance.
///
/// # Errors
///
/// Returns an error if the index fails an operation.
pub async fn run_index_conformance_tests(index: &dyn FileIndex) -> Result<(), IndexError> {
    test_lookup_missing(index).await?;
    test_insert_and_lookup(index).await?;
    test_duplicate_insert_returns_existing(index).await?;
    test_dedup_is_scoped_per_owner(index).await?;
    test_find_by_name(index).await?;
    test_remove(index).await?;
    test_list_newest_first(index).await?;
    Ok(())
}

async fn test_lookup_missing(index: &dyn FileIndex) -> Result<(), IndexError> {
    let hash = ContentHash::from_digest(&[0xEE; 32]);
    let found = index.lookup("nobody", &hash).await?;
    assert!(found.is_none(), "lookup on empty index should return None");
    Ok(())
}

async fn test_insert_and_lookup(index: &dyn FileIndex) -> Result<(), IndexError> {
    let record = record_fixture("conf-insert", "invoice.pdf", 1);
    let outcome = index.insert(record.clone()).await?;
    assert_eq!(outcome, InsertOutcome::Inserted);

    let found = index.lookup("conf-insert", &record.content_hash).await?;
    assert_eq!(found.as_ref(), Some(&record));
    assert_eq!(index.get(record.id).await?.as_ref(), Some(&record));
    Ok(())
}

async fn test_duplicate_insert_returns_existing(index: &dyn FileIndex) -> Result<(), IndexError> {
    let first = record_fixture("conf-dup", "scan.png", 2);
    index.insert(first.clone()).await?;

    let second = record_fixture("conf-dup", "scan-copy.png", 2);
    let outcome = index.insert(second.clone()).await?;
    assert_eq!(
        outcome,
        InsertOutcome::Duplicate(first.clone()),
        "second insert of the same content should return the first record"
    );
    assert!(
        index.get(second.id).await?.is_none(),
        "duplicate must not be stored"
    );
    assert_eq!(index.list("conf-dup").await?.len(), 1);
    Ok(())
}

async fn test_dedup_is_scoped_per_owner(index: &dyn FileIndex) -> Result<(), IndexError> {
    let alice = record_fixture("conf-alice", "same.txt", 3);
    let bob = record_fixture("conf-bob", "same.txt", 3);
    assert_eq!(index.insert(alice).await?, InsertOutcome::Inserted);
    assert_eq!(
        index.insert(bob).await?,
        InsertOutcome::Inserted,
        "identical bytes from another owner are independent"
    );
    Ok(())
}

async fn test_find_by_name(index: &dyn FileIndex) -> Result<(), IndexError> {
    let mut on_dropbox = record_fixture("conf-name", "report.docx", 4);
    on_dropbox.backend = BackendKind::Dropbox;
    let on_cloudinary = record_fixture("conf-name", "report.docx", 5);
    index.insert(on_dropbox.clone()).await?;
    index.insert(on_cloudinary).await?;

    let found = index
        .find_by_name("conf-name", "report.docx", BackendKind::Dropbox)
        .await?;
    assert_eq!(found, vec![on_dropbox], "name lookup is per backend");

    let none = index
        .find_by_name("someone-else", "report.docx", BackendKind::Dropbox)
        .await?;
    assert!(none.is_empty(), "name lookup is per owner");
    Ok(())
}

async fn test_remove(index: &dyn FileIndex) -> Result<(), IndexError> {
    let record = record_fixture("conf-remove", "old.txt", 6);
    index.insert(record.clone()).await?;

    assert!(index.remove(record.id).await?, "remove should return true");
    assert!(index.get(record.id).await?.is_none());
    assert!(
        index
            .lookup("conf-remove", &record.content_hash)
            .await?
            .is_none(),
        "remove should clear the hash entry"
    );
    assert!(
        !index.remove(record.id).await?,
        "remove on missing record should return false"
    );
    Ok(())
}

async fn test_list_newest_first(index: &dyn FileIndex) -> Result<(), IndexError> {
    let now = Utc::now();
    let mut oldest = record_fixture("conf-list", "1.txt", 7);
    oldest.created_at = now - Duration::minutes(10);
    let mut newest = record_fixture("conf-list", "3.txt", 8);
    newest.created_at = now;
    let mut middle = record_fixture("conf-list", "2.txt", 9);
    middle.created_at = now - Duration::minutes(5);

    index.insert(oldest.clone()).await?;
    index.insert(newest.clone()).await?;
    index.insert(middle.clone()).await?;

    let ids: Vec<Uuid> = index
        .list("conf-list")
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    Ok(())
}
