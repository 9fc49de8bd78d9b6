//! In-process memory store with optional JSON snapshot persistence.

use crate::error::{Error, Result};
use crate::scorer;
use crate::store::MemoryStore;
use crate::types::{MemoryQuery, MemoryRecord, Metadata, ScoredMemory};

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Memory store kept in a `Vec`, optionally mirrored to a JSON file.
///
/// A store opened from a path writes a snapshot after every mutation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
    path: Option<PathBuf>,
}

impl InMemoryStore {
    /// Empty, non-persistent store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a snapshot file, creating an empty store if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), count = records.len(), "memory snapshot loaded");
        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    /// Write the snapshot now (no-op for non-persistent stores).
    pub async fn save(&self) -> Result<()> {
        let records = self.records.read().await;
        self.write_snapshot(&records).await
    }

    async fn write_snapshot(&self, records: &[MemoryRecord]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), count = records.len(), "memory snapshot written");
        Ok(())
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryStore {
    async fn add(&self, content: &str, metadata: Metadata) -> Result<String> {
        let record = MemoryRecord::new(content, metadata);
        let id = record.id.clone();
        let mut records = self.records.write().await;
        records.push(record);
        self.write_snapshot(&records).await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn query(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>> {
        let records = self.records.read().await;
        scorer::rank(query, records.iter())
    }

    async fn update(
        &self,
        id: &str,
        content: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<MemoryRecord> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if let Some(content) = content {
            record.content = content.to_string();
        }
        if let Some(metadata) = metadata {
            record.metadata = metadata;
        }
        record.updated_at = Utc::now();
        let updated = record.clone();
        self.write_snapshot(&records).await?;
        Ok(updated)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !ids.contains(&r.id));
        let removed = before - records.len();
        if removed > 0 {
            self.write_snapshot(&records).await?;
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<MemoryRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        let mut records = self.records.write().await;
        records.clear();
        self.write_snapshot(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(category: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("category".into(), category.into());
        metadata
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let store = InMemoryStore::new();
        let id = store
            .add("User prefers a window seat", tags("preferences"))
            .await
            .unwrap();
        store
            .add("User booked flight 321", tags("bookings"))
            .await
            .unwrap();

        let hits = store.query(&MemoryQuery::new("window")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, id);

        let updated = store
            .update(&id, Some("User prefers an aisle seat"), None)
            .await
            .unwrap();
        assert_eq!(updated.metadata.get("category").unwrap(), "preferences");
        assert!(store.query(&MemoryQuery::new("window")).await.unwrap().is_empty());

        assert_eq!(store.delete(&[id.clone(), "missing".into()]).await.unwrap(), 1);
        assert!(store.get(&id).await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = InMemoryStore::new();
        let err = store.update("nope", Some("x"), None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory").join("user.json");

        let store = InMemoryStore::open(&path).await.unwrap();
        let id = store
            .add("User is a vegetarian", tags("preferences"))
            .await
            .unwrap();
        drop(store);

        let reopened = InMemoryStore::open(&path).await.unwrap();
        let records = reopened.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].content, "User is a vegetarian");
    }
}
