//! Error types for the memory store.

/// Errors that can occur in memory store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// SQLite database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Snapshot file could not be read or written
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization / deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No memory with this ID
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Query rejected before reaching the store
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// General internal error
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        )
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
