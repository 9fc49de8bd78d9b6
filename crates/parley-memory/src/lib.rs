//! Parley Memory - Memory Store Capability
//!
//! Agents remember facts about a user (preferences, past bookings, notes)
//! and recall the ones relevant to the current conversation.
//!
//! ```text
//! add(content, metadata) ──► MemoryRecord
//!                                 │
//!                       MemoryStore (in-memory | SQLite)
//!                                 │
//! query(text, filter, k) ──► lexical cosine scorer ──► ScoredMemory
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod in_memory;
pub mod scorer;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, SharedMemoryStore};
pub use types::{MemoryQuery, MemoryRecord, Metadata, ScoredMemory};
