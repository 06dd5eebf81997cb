use async_trait::async_trait;
use filekeep_core::{BackendKind, ContentHash, StoredFile};
use uuid::Uuid;

use crate::error::IndexError;

/// Result of [`FileIndex::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored.
    Inserted,
    /// Another record with the same `(owner_id, content_hash)` was committed
    /// first. Nothing was stored; the existing record is returned.
    Duplicate(StoredFile),
}

/// Store of [`StoredFile`] records, keyed for content-hash dedup.
///
/// Implementations must enforce `(owner_id, content_hash)` uniqueness inside
/// [`insert`](FileIndex::insert) itself, atomically with respect to concurrent
/// inserts. A prior [`lookup`](FileIndex::lookup) miss is not a reservation.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Find the owner's record with the given content hash.
    async fn lookup(
        &self,
        owner_id: &str,
        hash: &ContentHash,
    ) -> Result<Option<StoredFile>, IndexError>;

    /// Records for `name` on `backend` belonging to `owner_id`.
    async fn find_by_name(
        &self,
        owner_id: &str,
        name: &str,
        backend: BackendKind,
    ) -> Result<Vec<StoredFile>, IndexError>;

    /// Store a new record unless its `(owner_id, content_hash)` already exists.
    async fn insert(&self, record: StoredFile) -> Result<InsertOutcome, IndexError>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>, IndexError>;

    /// Hard-delete a record. Returns `true` if it existed.
    async fn remove(&self, id: Uuid) -> Result<bool, IndexError>;

    /// All records of `owner_id`, newest first.
    async fn list(&self, owner_id: &str) -> Result<Vec<StoredFile>, IndexError>;
}
