//! In-memory implementation of [`EntityStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and one-shot runs
//! where persistence isn't needed. It keeps the snapshot and derived tables
//! in plain collections with identical semantics to the SQLite backend.

use std::collections::HashSet;

use modgraph_core::{
    DefId, Definition, EntityIndex, EntityKind, IndirectConflict, ModInfo, TransitiveReference,
};

use crate::error::StorageError;
use crate::hash::fingerprint_graph;
use crate::traits::EntityStore;
use crate::types::{BuildRecord, GraphTables, Snapshot, StoreCounts};

/// In-memory backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshot: Snapshot,
    index: EntityIndex,
    graph: GraphTables,
    last_build: Option<BuildRecord>,
    next_build_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            next_build_id: 1,
            ..InMemoryStore::default()
        }
    }

    /// Creates a store pre-loaded with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Result<Self, StorageError> {
        let mut store = InMemoryStore::new();
        store.save_snapshot(&snapshot)?;
        Ok(store)
    }
}

/// Rejects snapshots the SQLite schema would refuse, so both backends
/// accept exactly the same input.
pub(crate) fn check_snapshot(snapshot: &Snapshot) -> Result<(), StorageError> {
    let mut ids = HashSet::with_capacity(snapshot.definitions.len());
    for def in &snapshot.definitions {
        if !ids.insert(def.id) {
            return Err(StorageError::IntegrityError {
                reason: format!("duplicate definition id {}", def.id),
            });
        }
    }
    if let Some(orphan) = snapshot
        .properties
        .iter()
        .find(|p| !ids.contains(&p.definition_id))
    {
        return Err(StorageError::IntegrityError {
            reason: format!(
                "property '{}' belongs to unknown definition {}",
                orphan.name, orphan.definition_id
            ),
        });
    }
    let mut mod_names = HashSet::new();
    for m in &snapshot.mods {
        if !mod_names.insert(m.name.as_str()) {
            return Err(StorageError::IntegrityError {
                reason: format!("duplicate mod name '{}'", m.name),
            });
        }
    }
    Ok(())
}

impl EntityStore for InMemoryStore {
    // -------------------------------------------------------------------
    // Base tables
    // -------------------------------------------------------------------

    fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        check_snapshot(snapshot)?;
        self.snapshot = snapshot.clone();
        self.index = EntityIndex::new(snapshot.definitions.clone());
        self.graph = GraphTables::default();
        self.last_build = None;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Snapshot, StorageError> {
        let mut snapshot = self.snapshot.clone();
        snapshot.definitions.sort_by_key(|d| d.id);
        snapshot.mods.sort_by_key(|m| m.id);
        Ok(snapshot)
    }

    fn get_definition(&self, id: DefId) -> Result<Definition, StorageError> {
        self.index
            .get(id)
            .cloned()
            .ok_or(StorageError::DefinitionNotFound(id.0))
    }

    fn find_definition(
        &self,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Option<Definition>, StorageError> {
        Ok(self.index.find(kind, name).cloned())
    }

    fn list_mods(&self) -> Result<Vec<ModInfo>, StorageError> {
        let mut mods = self.snapshot.mods.clone();
        mods.sort_by_key(|m| m.id);
        Ok(mods)
    }

    // -------------------------------------------------------------------
    // Derived tables
    // -------------------------------------------------------------------

    fn replace_graph(&mut self, tables: &GraphTables) -> Result<BuildRecord, StorageError> {
        // Everything fallible happens before the swap.
        let fingerprint = fingerprint_graph(tables)?;
        let staged = tables.clone();
        let record = BuildRecord {
            build_id: self.next_build_id.max(1),
            fingerprint: fingerprint.to_hex().to_string(),
            transitive_count: staged.transitive.len(),
            indirect_conflict_count: staged.indirect_conflicts.len(),
            patch_conflict_count: staged.patch_conflicts.len(),
        };

        self.graph = staged;
        self.next_build_id = record.build_id + 1;
        self.last_build = Some(record.clone());
        Ok(record)
    }

    fn load_graph(&self) -> Result<GraphTables, StorageError> {
        Ok(self.graph.clone())
    }

    fn transitive_to(&self, target: DefId) -> Result<Vec<TransitiveReference>, StorageError> {
        Ok(self
            .graph
            .transitive
            .iter()
            .filter(|t| t.target_def_id == target)
            .cloned()
            .collect())
    }

    fn transitive_from(&self, source: DefId) -> Result<Vec<TransitiveReference>, StorageError> {
        Ok(self
            .graph
            .transitive
            .iter()
            .filter(|t| t.source_def_id == source)
            .cloned()
            .collect())
    }

    fn conflicts_at(&self, def: DefId) -> Result<Vec<IndirectConflict>, StorageError> {
        Ok(self
            .graph
            .indirect_conflicts
            .iter()
            .filter(|c| c.shared_entity_def_id == def)
            .cloned()
            .collect())
    }

    fn last_build(&self) -> Result<Option<BuildRecord>, StorageError> {
        Ok(self.last_build.clone())
    }

    fn counts(&self) -> Result<StoreCounts, StorageError> {
        Ok(StoreCounts {
            definitions: self.snapshot.definitions.len(),
            properties: self.snapshot.properties.len(),
            references: self.snapshot.references.len(),
            mods: self.snapshot.mods.len(),
            operations: self.snapshot.operations.len(),
            patches: self.snapshot.patches.len(),
            transitive: self.graph.transitive.len(),
            indirect_conflicts: self.graph.indirect_conflicts.len(),
            patch_conflicts: self.graph.patch_conflicts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use modgraph_core::{ModId, Property, Severity};

    fn snapshot() -> Snapshot {
        Snapshot {
            definitions: vec![
                Definition::new(2, "item", "woodFrame").extending("woodBlock"),
                Definition::new(1, "block", "woodBlock"),
            ],
            properties: vec![Property::new(2, "Material", "Mwood")],
            mods: vec![ModInfo {
                id: ModId(1),
                name: "ModA".into(),
            }],
            ..Snapshot::default()
        }
    }

    fn tables() -> GraphTables {
        GraphTables {
            transitive: vec![TransitiveReference {
                source_def_id: DefId(2),
                target_def_id: DefId(1),
                path_depth: 1,
                reference_types: BTreeSet::from(["extends".to_string()]),
            }],
            indirect_conflicts: vec![IndirectConflict {
                shared_entity_def_id: DefId(1),
                pattern_id: "remove-then-depend".into(),
                pattern_name: "Remove-then-depend".into(),
                severity: Severity::High,
                explanation: "x".into(),
                involved_mod_ids: BTreeSet::from([ModId(1)]),
            }],
            patch_conflicts: Vec::new(),
        }
    }

    #[test]
    fn point_lookups_after_save() {
        let store = InMemoryStore::with_snapshot(snapshot()).unwrap();
        assert_eq!(store.get_definition(DefId(1)).unwrap().name, "woodBlock");
        assert!(matches!(
            store.get_definition(DefId(9)),
            Err(StorageError::DefinitionNotFound(9))
        ));
        let found = store.find_definition(&EntityKind::Item, "woodFrame").unwrap();
        assert_eq!(found.map(|d| d.id), Some(DefId(2)));
        assert!(store.find_definition(&EntityKind::Block, "woodFrame").unwrap().is_none());
    }

    #[test]
    fn load_snapshot_sorts_definitions() {
        let store = InMemoryStore::with_snapshot(snapshot()).unwrap();
        let loaded = store.load_snapshot().unwrap();
        assert_eq!(loaded.definitions[0].id, DefId(1));
    }

    #[test]
    fn orphan_property_is_rejected() {
        let mut bad = snapshot();
        bad.properties.push(Property::new(77, "HandItem", "x"));
        let err = InMemoryStore::with_snapshot(bad).unwrap_err();
        assert!(matches!(err, StorageError::IntegrityError { .. }));
    }

    #[test]
    fn replace_graph_swaps_tables_and_numbers_builds() {
        let mut store = InMemoryStore::with_snapshot(snapshot()).unwrap();
        let first = store.replace_graph(&tables()).unwrap();
        let second = store.replace_graph(&tables()).unwrap();
        assert_eq!(first.build_id, 1);
        assert_eq!(second.build_id, 2);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(store.transitive_to(DefId(1)).unwrap().len(), 1);
        assert_eq!(store.transitive_from(DefId(1)).unwrap().len(), 0);
        assert_eq!(store.conflicts_at(DefId(1)).unwrap().len(), 1);
        assert_eq!(store.last_build().unwrap(), Some(second));
    }

    #[test]
    fn saving_a_snapshot_clears_derived_tables() {
        let mut store = InMemoryStore::with_snapshot(snapshot()).unwrap();
        store.replace_graph(&tables()).unwrap();
        store.save_snapshot(&snapshot()).unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.transitive, 0);
        assert_eq!(counts.definitions, 2);
        assert!(store.last_build().unwrap().is_none());
    }
}
