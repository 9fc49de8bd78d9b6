//! MemoryStore trait

use crate::error::Result;
use crate::types::{MemoryQuery, MemoryRecord, Metadata, ScoredMemory};
use std::sync::Arc;

/// Create/read/update/delete plus similarity search over remembered facts.
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    /// Remember `content`; returns the new memory's ID.
    async fn add(&self, content: &str, metadata: Metadata) -> Result<String>;

    /// Fetch one memory by ID.
    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>>;

    /// Memories most similar to the query, best first.
    async fn query(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>>;

    /// Replace the content and/or metadata of an existing memory.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) for unknown IDs.
    async fn update(
        &self,
        id: &str,
        content: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<MemoryRecord>;

    /// Delete memories by ID. Returns how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// All memories, oldest first.
    async fn list(&self) -> Result<Vec<MemoryRecord>>;

    /// Forget everything.
    async fn clear(&self) -> Result<()>;
}

/// Memory store shared between tools and agents
pub type SharedMemoryStore = Arc<dyn MemoryStore>;
