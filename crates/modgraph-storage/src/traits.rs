//! The [`EntityStore`] trait defining the storage contract of the engine.
//!
//! Two groups of tables:
//! - **Base tables** (definitions, properties, references, mods, mod
//!   operations, patch records, class hierarchy) are written once per import
//!   through [`EntityStore::save_snapshot`] and read back in bulk or by point
//!   lookup.
//! - **Derived tables** (transitive references, indirect conflicts, patch
//!   conflicts) are caches owned by the engine. [`EntityStore::replace_graph`]
//!   swaps all of them in one step: readers see either the previous build or
//!   the new one, never a mix.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait with
//! identical semantics.

use modgraph_core::{
    DefId, Definition, EntityKind, IndirectConflict, ModInfo, TransitiveReference,
};

use crate::error::StorageError;
use crate::types::{BuildRecord, GraphTables, Snapshot, StoreCounts};

/// The storage contract for entity snapshots and derived graph tables.
///
/// The trait is synchronous; the engine runs as a single-process batch job.
pub trait EntityStore {
    // -------------------------------------------------------------------
    // Base tables
    // -------------------------------------------------------------------

    /// Replaces every base table with `snapshot`.
    ///
    /// Derived tables are cleared in the same step, since they describe a
    /// snapshot that no longer exists.
    fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Loads every base table.
    fn load_snapshot(&self) -> Result<Snapshot, StorageError>;

    /// Retrieves a definition by id.
    fn get_definition(&self, id: DefId) -> Result<Definition, StorageError>;

    /// Exact `(kind, name)` lookup. Duplicates resolve to the lowest id.
    fn find_definition(
        &self,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Option<Definition>, StorageError>;

    /// Lists all mods, ordered by id.
    fn list_mods(&self) -> Result<Vec<ModInfo>, StorageError>;

    // -------------------------------------------------------------------
    // Derived tables
    // -------------------------------------------------------------------

    /// Atomically replaces all derived tables and records the build.
    ///
    /// On error the previously committed tables remain visible.
    fn replace_graph(&mut self, tables: &GraphTables) -> Result<BuildRecord, StorageError>;

    /// Loads every derived table.
    fn load_graph(&self) -> Result<GraphTables, StorageError>;

    /// Transitive rows whose target is `target` (its dependents).
    fn transitive_to(&self, target: DefId) -> Result<Vec<TransitiveReference>, StorageError>;

    /// Transitive rows whose source is `source` (its dependencies).
    fn transitive_from(&self, source: DefId) -> Result<Vec<TransitiveReference>, StorageError>;

    /// Indirect conflicts anchored at `def`.
    fn conflicts_at(&self, def: DefId) -> Result<Vec<IndirectConflict>, StorageError>;

    /// The most recent committed build, if any.
    fn last_build(&self) -> Result<Option<BuildRecord>, StorageError>;

    /// Row counts of every table.
    fn counts(&self) -> Result<StoreCounts, StorageError>;
}
