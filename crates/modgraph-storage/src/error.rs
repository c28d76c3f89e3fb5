//! Storage error types for modgraph-storage.
//!
//! [`StorageError`] covers the failure modes of the storage layer: the
//! underlying database, migrations, serialization of set-valued columns,
//! missing rows and integrity violations.

use thiserror::Error;

use modgraph_core::CoreError;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite database could not be opened, read or written.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded into a core type.
    #[error("decode error: {0}")]
    Decode(#[from] CoreError),

    /// A definition with the given id was not found.
    #[error("definition not found: {0}")]
    DefinitionNotFound(u64),

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}
