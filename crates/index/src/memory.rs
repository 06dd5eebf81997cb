use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use filekeep_core::{BackendKind, ContentHash, StoredFile};
use tracing::debug;
use uuid::Uuid;

use crate::error::IndexError;
use crate::index::{FileIndex, InsertOutcome};

type HashKey = (String, ContentHash);

/// In-memory [`FileIndex`] backed by two [`DashMap`]s.
///
/// `by_hash` is the unique index. It is always locked before `records` when
/// both are touched, so the two maps cannot deadlock each other.
#[derive(Debug, Default)]
pub struct MemoryFileIndex {
    records: DashMap<Uuid, StoredFile>,
    by_hash: DashMap<HashKey, Uuid>,
}

impl MemoryFileIndex {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn hash_key(owner_id: &str, hash: &ContentHash) -> HashKey {
        (owner_id.to_owned(), hash.clone())
    }
}

#[async_trait]
impl FileIndex for MemoryFileIndex {
    async fn lookup(
        &self,
        owner_id: &str,
        hash: &ContentHash,
    ) -> Result<Option<StoredFile>, IndexError> {
        let Some(id) = self
            .by_hash
            .get(&Self::hash_key(owner_id, hash))
            .map(|entry| *entry)
        else {
            return Ok(None);
        };
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_by_name(
        &self,
        owner_id: &str,
        name: &str,
        backend: BackendKind,
    ) -> Result<Vec<StoredFile>, IndexError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.is_version_of(owner_id, name, backend))
            .map(|r| r.clone())
            .collect())
    }

    async fn insert(&self, record: StoredFile) -> Result<InsertOutcome, IndexError> {
        let key = Self::hash_key(&record.owner_id, &record.content_hash);

        // The entry guard holds the shard lock for the whole check-then-write.
        match self.by_hash.entry(key) {
            Entry::Occupied(mut occupied) => {
                if let Some(existing) = self.records.get(occupied.get()) {
                    debug!(id = %existing.id, "insert hit unique (owner, hash) constraint");
                    return Ok(InsertOutcome::Duplicate(existing.clone()));
                }
                // Stale index entry left by a concurrent remove.
                occupied.insert(record.id);
                self.records.insert(record.id, record);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record.id);
                self.records.insert(record.id, record);
            }
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>, IndexError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn remove(&self, id: Uuid) -> Result<bool, IndexError> {
        let Some((_, record)) = self.records.remove(&id) else {
            return Ok(false);
        };
        self.by_hash.remove_if(
            &Self::hash_key(&record.owner_id, &record.content_hash),
            |_, indexed| *indexed == id,
        );
        Ok(true)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<StoredFile>, IndexError> {
        let mut records: Vec<StoredFile> = self
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }
}
