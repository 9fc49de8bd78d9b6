//! Memory CLI commands
//!
//! `parley memory add`     - remember a fact
//! `parley memory query`   - show the facts closest to a text
//! `parley memory delete`  - forget facts by id
//! `parley memory list`    - show every fact

use crate::config::AppConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use parley_memory::{MemoryQuery, MemoryRecord, MemoryStore, Metadata, SqliteStore};

const CATEGORY: &str = "category";

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// Remember a fact
    Add {
        /// The fact
        content: String,
        /// Category stored in the fact's metadata
        #[arg(long)]
        category: Option<String>,
    },
    /// Show the facts most relevant to a text
    Query {
        /// Text to match
        text: String,
        /// Maximum results (defaults to memory.default_k)
        #[arg(short, long)]
        k: Option<usize>,
        /// Only facts in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Forget facts by id
    Delete {
        /// Ids to delete
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show every fact
    List,
}

/// Run a memory subcommand against the configured store
pub async fn run(config: &AppConfig, command: MemoryCommand) -> Result<()> {
    let path = config.memory.resolved_path();
    let store = SqliteStore::from_path(&path)
        .await
        .with_context(|| format!("Failed to open memory store at {}", path.display()))?;

    for line in execute(&store, command, config.memory.default_k).await? {
        println!("{}", line);
    }
    Ok(())
}

async fn execute(
    store: &dyn MemoryStore,
    command: MemoryCommand,
    default_k: usize,
) -> Result<Vec<String>> {
    match command {
        MemoryCommand::Add { content, category } => {
            let mut metadata = Metadata::new();
            if let Some(category) = category {
                metadata.insert(CATEGORY.to_string(), category);
            }
            let id = store.add(&content, metadata).await?;
            Ok(vec![format!("Remembered {}", id)])
        }
        MemoryCommand::Query { text, k, category } => {
            let mut query = MemoryQuery::new(text).with_k(k.unwrap_or(default_k));
            if let Some(category) = category {
                query = query.with_filter(CATEGORY, category);
            }
            let found = store.query(&query).await?;
            if found.is_empty() {
                return Ok(vec!["No matching memories.".to_string()]);
            }
            Ok(found
                .iter()
                .map(|m| format!("{:.3}  {}", m.score, describe(&m.record)))
                .collect())
        }
        MemoryCommand::Delete { ids } => {
            let deleted = store.delete(&ids).await?;
            Ok(vec![format!("Deleted {} of {} memories", deleted, ids.len())])
        }
        MemoryCommand::List => {
            let records = store.list().await?;
            if records.is_empty() {
                return Ok(vec!["No memories yet.".to_string()]);
            }
            Ok(records.iter().map(describe).collect())
        }
    }
}

fn describe(record: &MemoryRecord) -> String {
    match record.metadata.get(CATEGORY) {
        Some(category) => format!("{}  [{}] {}", record.id, category, record.content),
        None => format!("{}  {}", record.id, record.content),
    }
}
