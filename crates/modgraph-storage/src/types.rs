//! Storage-layer bundles: the base snapshot and the derived graph tables.
//!
//! [`Snapshot`] is everything the parsing and mod-scanning stages produce.
//! [`GraphTables`] is everything a graph build derives from it; the two are
//! written through separate store calls so that a rebuild never touches the
//! base tables.

use serde::{Deserialize, Serialize};

use modgraph_core::{
    ClassHierarchy, Definition, IndirectConflict, ModInfo, ModOperation, PatchConflict, PatchRecord,
    Property, Reference, TransitiveReference,
};

/// Base tables of one import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub definitions: Vec<Definition>,
    pub properties: Vec<Property>,
    pub references: Vec<Reference>,
    pub mods: Vec<ModInfo>,
    pub operations: Vec<ModOperation>,
    pub patches: Vec<PatchRecord>,
    /// `None` when no decompiled class hierarchy was supplied.
    pub class_hierarchy: Option<ClassHierarchy>,
}

/// Derived tables of one graph build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphTables {
    pub transitive: Vec<TransitiveReference>,
    pub indirect_conflicts: Vec<IndirectConflict>,
    pub patch_conflicts: Vec<PatchConflict>,
}

/// Metadata of a committed graph build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Monotonic build number within one store.
    pub build_id: i64,
    /// Hex blake3 fingerprint of the canonicalised derived rows.
    pub fingerprint: String,
    pub transitive_count: usize,
    pub indirect_conflict_count: usize,
    pub patch_conflict_count: usize,
}

/// Row counts of every table, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub definitions: usize,
    pub properties: usize,
    pub references: usize,
    pub mods: usize,
    pub operations: usize,
    pub patches: usize,
    pub transitive: usize,
    pub indirect_conflicts: usize,
    pub patch_conflicts: usize,
}
