//! SqliteStore - SQLite persistence for memories.

use crate::error::{Error, Result};
use crate::scorer;
use crate::store::MemoryStore;
use crate::types::{MemoryQuery, MemoryRecord, Metadata, ScoredMemory};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};


/// SQLite-backed memory store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub async fn from_path(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Memory store initialized at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store (for tests).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        debug!("In-memory SQLite memory store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS memories (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT NOT NULL UNIQUE,
                content    TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryRecord> {
        let metadata: String = row.try_get("metadata")?;
        let created: String = row.try_get("created_at")?;
        let updated: String = row.try_get("updated_at")?;
        Ok(MemoryRecord {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            metadata: serde_json::from_str(&metadata)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait::async_trait]
impl MemoryStore for SqliteStore {
    async fn add(&self, content: &str, metadata: Metadata) -> Result<String> {
        let record = MemoryRecord::new(content, metadata);
        sqlx::query(
            "INSERT INTO memories (id, content, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(record.id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let row = sqlx::query(
            "SELECT id, content, metadata, created_at, updated_at
             FROM memories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn query(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>> {
        let records = self.list().await?;
        scorer::rank(query, records.iter())
    }

    async fn update(
        &self,
        id: &str,
        content: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<MemoryRecord> {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if let Some(content) = content {
            record.content = content.to_string();
        }
        if let Some(metadata) = metadata {
            record.metadata = metadata;
        }
        record.updated_at = Utc::now();

        sqlx::query(
            "UPDATE memories SET content = ?2, metadata = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM memories WHERE id = ?1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            removed += result.rows_affected() as usize;
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<MemoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata, created_at, updated_at
             FROM memories ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM memories")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
