//! Memory tools
//!
//! Expose a [`MemoryStore`](parley_memory::MemoryStore) to agents:
//! `remember` stores a fact, `recall` searches, `forget` deletes by ID.

use crate::error::Result;
use crate::registry::{Tool, ToolCategory, ToolDefinition, ToolResult};
use parley_memory::{MemoryQuery, Metadata, SharedMemoryStore};
use serde::Deserialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::function::parse_input;

#[derive(Debug, Deserialize)]
struct RememberInput {
    content: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecallInput {
    query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForgetInput {
    ids: Vec<String>,
}

/// Stores a fact in the memory store
pub struct RememberTool {
    definition: ToolDefinition,
    store: SharedMemoryStore,
}

impl RememberTool {
    /// Create the tool over `store`
    #[must_use]
    pub fn new(store: SharedMemoryStore) -> Self {
        let definition = ToolDefinition::new(
            "remember",
            "Remember a fact about the user for later conversations.",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "content": {"type": "string"},
                "category": {"type": "string", "description": "e.g. preferences, bookings"}
            },
            "required": ["content"]
        }))
        .with_category(ToolCategory::Memory);
        Self { definition, store }
    }
}

#[async_trait::async_trait]
impl Tool for RememberTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let start = Instant::now();
        let input: RememberInput = parse_input(input)?;
        let mut metadata = Metadata::new();
        if let Some(category) = input.category {
            metadata.insert("category".to_string(), category);
        }
        let id = self.store.add(&input.content, metadata).await?;
        debug!(id = %id, "Memory stored");
        Ok(ToolResult::success(
            serde_json::json!({ "id": id }),
            start.elapsed().as_millis() as u64,
        ))
    }
}

/// Searches the memory store
pub struct RecallTool {
    definition: ToolDefinition,
    store: SharedMemoryStore,
}

impl RecallTool {
    /// Create the tool over `store`
    #[must_use]
    pub fn new(store: SharedMemoryStore) -> Self {
        let definition = ToolDefinition::new(
            "recall",
            "Search remembered facts relevant to a query.",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "k": {"type": "integer", "minimum": 1},
                "category": {"type": "string"}
            },
            "required": ["query"]
        }))
        .with_category(ToolCategory::Memory);
        Self { definition, store }
    }
}

#[async_trait::async_trait]
impl Tool for RecallTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let start = Instant::now();
        let input: RecallInput = parse_input(input)?;
        let mut query = MemoryQuery::new(input.query);
        if let Some(k) = input.k {
            query = query.with_k(k);
        }
        if let Some(category) = input.category {
            query = query.with_filter("category", category);
        }

        let hits = self.store.query(&query).await?;
        let output: Vec<serde_json::Value> = hits
            .into_iter()
            .map(|hit| {
                serde_json::json!({
                    "id": hit.record.id,
                    "content": hit.record.content,
                    "score": hit.score,
                })
            })
            .collect();
        Ok(ToolResult::success(
            serde_json::Value::Array(output),
            start.elapsed().as_millis() as u64,
        ))
    }
}

/// Deletes memories by ID
pub struct ForgetTool {
    definition: ToolDefinition,
    store: SharedMemoryStore,
}

impl ForgetTool {
    /// Create the tool over `store`
    #[must_use]
    pub fn new(store: SharedMemoryStore) -> Self {
        let definition = ToolDefinition::new("forget", "Delete remembered facts by ID.")
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "ids": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["ids"]
            }))
            .with_category(ToolCategory::Memory);
        Self { definition, store }
    }
}

#[async_trait::async_trait]
impl Tool for ForgetTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let start = Instant::now();
        let input: ForgetInput = parse_input(input)?;
        let removed = self.store.delete(&input.ids).await?;
        Ok(ToolResult::success(
            serde_json::json!({ "deleted": removed }),
            start.elapsed().as_millis() as u64,
        ))
    }
}
