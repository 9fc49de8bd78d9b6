//! Core data types for the memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form key/value tags attached to a memory (e.g. `category = "preferences"`).
pub type Metadata = BTreeMap<String, String>;

/// One remembered fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique memory ID (UUID)
    pub id: String,
    /// Remembered text
    pub content: String,
    /// Tags used for filtering
    #[serde(default)]
    pub metadata: Metadata,
    /// When this memory was created
    pub created_at: DateTime<Utc>,
    /// When this memory was last updated
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a record with a fresh ID
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether every filter entry is present with the same value
    #[must_use]
    pub fn matches(&self, filter: &Metadata) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.metadata.get(key) == Some(value))
    }
}

/// A similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Text to compare memories against
    pub text: String,
    /// Only consider memories whose metadata contains all of these entries
    #[serde(default)]
    pub filter: Metadata,
    /// Maximum number of results
    #[serde(default = "default_k")]
    pub k: usize,
    /// Drop results scoring below this value
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

fn default_k() -> usize {
    3
}

impl MemoryQuery {
    /// Query for `text` with default `k` and no filter
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filter: Metadata::new(),
            k: default_k(),
            score_threshold: None,
        }
    }

    /// Set the result limit
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Require a metadata entry
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Set the minimum score
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

/// A memory with its similarity to the query (0.0–1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    /// The memory
    pub record: MemoryRecord,
    /// Cosine similarity to the query
    pub score: f32,
}
