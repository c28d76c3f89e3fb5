//! Storage abstraction for modgraph entity snapshots and graph builds.
//!
//! Provides the [`EntityStore`] trait defining the storage contract that all
//! backends implement, plus the [`InMemoryStore`] and [`SqliteStore`] as
//! first-class backends.
//!
//! # Architecture
//!
//! The storage layer separates two groups of tables:
//! - **Base tables** hold one imported snapshot (definitions, properties,
//!   references, mods, mod operations, patch records, class hierarchy).
//! - **Derived tables** hold the output of the last graph build and are
//!   swapped as a unit by [`EntityStore::replace_graph`].
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: Snapshot, GraphTables, BuildRecord, StoreCounts
//! - [`traits`]: EntityStore trait definition
//! - [`hash`]: blake3 build fingerprints
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema and migration setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod hash;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use hash::fingerprint_graph;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::EntityStore;
pub use types::{BuildRecord, GraphTables, Snapshot, StoreCounts};
