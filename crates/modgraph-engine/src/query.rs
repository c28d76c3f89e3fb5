//! Impact query surface.
//!
//! Read operations over the materialised graph tables. Unknown entities are
//! a typed [`EngineError::NotFound`]; a known entity with nothing attached is
//! an empty result.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use modgraph_core::{
    DefId, Definition, EntityIndex, EntityKind, IndirectConflict, ReferenceGraph, SeverityCounts,
    TransitiveReference,
};
use modgraph_storage::{BuildRecord, EntityStore, StoreCounts};

use crate::error::EngineError;

/// Which side of a transitive row the queried entity is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Definitions that reach the entity.
    Dependents,
    /// Definitions the entity reaches.
    Dependencies,
}

/// One row of an impact listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactRow {
    pub def_id: DefId,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    pub depth: u32,
    pub reference_types: BTreeSet<String>,
}

/// One step of a reference chain, resolved to a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHop {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    /// Label of the edge that led here; `None` for the starting definition.
    pub context: Option<String>,
}

/// A definition ranked by the number of distinct definitions it reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutEntry {
    pub def_id: DefId,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    pub fan_out: usize,
}

/// Summary statistics of the store and its last build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub counts: StoreCounts,
    pub indirect: SeverityCounts,
    pub patch: SeverityCounts,
    pub top_fan_out: Vec<FanOutEntry>,
    pub last_build: Option<BuildRecord>,
}

/// Queries against one store.
pub struct ImpactQuery<'s, S: EntityStore> {
    store: &'s S,
}

impl<'s, S: EntityStore> ImpactQuery<'s, S> {
    pub fn new(store: &'s S) -> Self {
        ImpactQuery { store }
    }

    /// Exact `(kind, name)` lookup, failing with `NotFound`.
    pub fn lookup(&self, kind: &EntityKind, name: &str) -> Result<Definition, EngineError> {
        self.store
            .find_definition(kind, name)?
            .ok_or_else(|| EngineError::not_found(kind, name))
    }

    /// Definitions that transitively reference `(kind, name)`, ordered by
    /// depth, then name.
    pub fn dependents(&self, kind: &EntityKind, name: &str) -> Result<Vec<ImpactRow>, EngineError> {
        self.impact(Direction::Dependents, kind, name)
    }

    /// Definitions `(kind, name)` transitively references, in the same order.
    pub fn dependencies(&self, kind: &EntityKind, name: &str) -> Result<Vec<ImpactRow>, EngineError> {
        self.impact(Direction::Dependencies, kind, name)
    }

    pub fn impact(
        &self,
        direction: Direction,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Vec<ImpactRow>, EngineError> {
        let def = self.lookup(kind, name)?;
        let rows = match direction {
            Direction::Dependents => self.store.transitive_to(def.id)?,
            Direction::Dependencies => self.store.transitive_from(def.id)?,
        };

        let mut cache: HashMap<DefId, Definition> = HashMap::new();
        cache.insert(def.id, def);
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let other = match direction {
                Direction::Dependents => row.source_def_id,
                Direction::Dependencies => row.target_def_id,
            };
            if !cache.contains_key(&other) {
                let found = self.store.get_definition(other)?;
                cache.insert(other, found);
            }
            let Some(other_def) = cache.get(&other) else {
                continue;
            };
            out.push(ImpactRow {
                def_id: other,
                kind: other_def.kind.clone(),
                name: other_def.name.clone(),
                depth: row.path_depth,
                reference_types: row.reference_types,
            });
        }
        out.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.def_id.cmp(&b.def_id))
        });
        Ok(out)
    }

    /// Indirect conflicts anchored at `(kind, name)`, High first, then by
    /// pattern id.
    pub fn conflicts_for(
        &self,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Vec<IndirectConflict>, EngineError> {
        let def = self.lookup(kind, name)?;
        let mut conflicts = self.store.conflicts_at(def.id)?;
        conflicts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        Ok(conflicts)
    }

    /// Shortest raw-reference path between two definitions.
    ///
    /// `Ok(None)` when both exist but `to` is unreachable from `from`.
    pub fn chain(
        &self,
        from_kind: &EntityKind,
        from_name: &str,
        to_kind: &EntityKind,
        to_name: &str,
    ) -> Result<Option<Vec<ChainHop>>, EngineError> {
        let from = self.lookup(from_kind, from_name)?;
        let to = self.lookup(to_kind, to_name)?;

        let snapshot = self.store.load_snapshot()?;
        let index = EntityIndex::new(snapshot.definitions);
        let graph = ReferenceGraph::build(&index, &snapshot.references);
        let Some(path) = graph.shortest_path(from.id, to.id) else {
            return Ok(None);
        };

        let hops = path
            .into_iter()
            .filter_map(|hop| {
                index.get(hop.def_id).map(|def| ChainHop {
                    kind: def.kind.clone(),
                    name: def.name.clone(),
                    context: hop.context,
                })
            })
            .collect();
        Ok(Some(hops))
    }

    /// The `n` definitions with the most distinct transitive targets.
    ///
    /// Self-pairs are not counted. Ties break by name.
    pub fn top_fan_out(&self, n: usize) -> Result<Vec<FanOutEntry>, EngineError> {
        let tables = self.store.load_graph()?;
        self.rank_fan_out(&tables.transitive, n)
    }

    fn rank_fan_out(
        &self,
        transitive: &[TransitiveReference],
        n: usize,
    ) -> Result<Vec<FanOutEntry>, EngineError> {
        let mut fan_out: HashMap<DefId, usize> = HashMap::new();
        for row in transitive {
            if row.source_def_id != row.target_def_id {
                *fan_out.entry(row.source_def_id).or_insert(0) += 1;
            }
        }

        let mut entries = Vec::with_capacity(fan_out.len());
        for (id, count) in fan_out {
            let def = self.store.get_definition(id)?;
            entries.push(FanOutEntry {
                def_id: id,
                kind: def.kind,
                name: def.name,
                fan_out: count,
            });
        }
        entries.sort_by(|a, b| {
            b.fan_out
                .cmp(&a.fan_out)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.def_id.cmp(&b.def_id))
        });
        entries.truncate(n);
        Ok(entries)
    }

    /// Table counts, conflicts by severity and the top-`top_n` fan-out list.
    pub fn stats(&self, top_n: usize) -> Result<GraphStats, EngineError> {
        let tables = self.store.load_graph()?;
        Ok(GraphStats {
            counts: self.store.counts()?,
            indirect: tables.indirect_conflicts.iter().map(|c| c.severity).collect(),
            patch: tables.patch_conflicts.iter().map(|c| c.severity).collect(),
            top_fan_out: self.rank_fan_out(&tables.transitive, top_n)?,
            last_build: self.store.last_build()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use modgraph_core::{Definition, ModId, Reference, Severity};
    use modgraph_storage::{GraphTables, InMemoryStore, Snapshot};

    fn tr(source: u64, target: u64, depth: u32, label: &str) -> TransitiveReference {
        TransitiveReference {
            source_def_id: DefId(source),
            target_def_id: DefId(target),
            path_depth: depth,
            reference_types: BTreeSet::from([label.to_string()]),
        }
    }

    fn conflict(anchor: u64, pattern: &str, severity: Severity) -> IndirectConflict {
        IndirectConflict {
            shared_entity_def_id: DefId(anchor),
            pattern_id: pattern.to_string(),
            pattern_name: pattern.to_string(),
            severity,
            explanation: String::new(),
            involved_mod_ids: BTreeSet::from([ModId(1)]),
        }
    }

    fn store() -> InMemoryStore {
        let snapshot = Snapshot {
            definitions: vec![
                Definition::new(1, "block", "woodBlock"),
                Definition::new(2, "item", "woodFrame").extending("woodBlock"),
                Definition::new(3, "recipe", "woodFrame"),
                Definition::new(4, "item", "lonely"),
                Definition::new(5, "item", "aardvark"),
            ],
            references: vec![
                Reference::new("item", 2, "block", "woodBlock", "extends"),
                Reference::new("recipe", 3, "item", "woodFrame", "recipe_output"),
            ],
            ..Snapshot::default()
        };
        let mut store = InMemoryStore::with_snapshot(snapshot).unwrap();
        store
            .replace_graph(&GraphTables {
                transitive: vec![
                    tr(2, 1, 1, "extends"),
                    tr(3, 2, 1, "recipe_output"),
                    tr(3, 1, 2, "extends"),
                    tr(5, 1, 2, "loot_entry"),
                ],
                indirect_conflicts: vec![
                    conflict(1, "write-write-shared-ancestor", Severity::Medium),
                    conflict(1, "remove-then-depend", Severity::High),
                ],
                patch_conflicts: Vec::new(),
            })
            .unwrap();
        store
    }

    #[test]
    fn dependents_are_ordered_by_depth_then_name() {
        let store = store();
        let rows = ImpactQuery::new(&store).dependents(&EntityKind::Block, "woodBlock").unwrap();
        let names: Vec<(&str, u32)> = rows.iter().map(|r| (r.name.as_str(), r.depth)).collect();
        assert_eq!(names, vec![("woodFrame", 1), ("aardvark", 2), ("woodFrame", 2)]);
        assert_eq!(rows[2].kind, EntityKind::Recipe);
    }

    #[test]
    fn dependencies_follow_the_source_side() {
        let store = store();
        let rows = ImpactQuery::new(&store).dependencies(&EntityKind::Recipe, "woodFrame").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].def_id, DefId(2));
        assert_eq!(rows[1].def_id, DefId(1));
    }

    #[test]
    fn unknown_entity_is_not_found_but_isolated_is_empty() {
        let store = store();
        let query = ImpactQuery::new(&store);
        assert!(query.dependents(&EntityKind::Item, "lonely").unwrap().is_empty());
        let err = query.dependents(&EntityKind::Item, "ghost").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn conflicts_are_ordered_high_first() {
        let store = store();
        let conflicts = ImpactQuery::new(&store)
            .conflicts_for(&EntityKind::Block, "woodBlock")
            .unwrap();
        let patterns: Vec<&str> = conflicts.iter().map(|c| c.pattern_id.as_str()).collect();
        assert_eq!(patterns, vec!["remove-then-depend", "write-write-shared-ancestor"]);
    }

    #[test]
    fn chain_walks_raw_references() {
        let store = store();
        let query = ImpactQuery::new(&store);
        let hops = query
            .chain(&EntityKind::Recipe, "woodFrame", &EntityKind::Block, "woodBlock")
            .unwrap()
            .unwrap();
        let names: Vec<&str> = hops.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["woodFrame", "woodFrame", "woodBlock"]);
        assert_eq!(hops[0].context, None);
        assert_eq!(hops[2].context.as_deref(), Some("extends"));

        let none = query
            .chain(&EntityKind::Block, "woodBlock", &EntityKind::Item, "lonely")
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn stats_rank_fan_out_and_count_severities() {
        let store = store();
        let stats = ImpactQuery::new(&store).stats(2).unwrap();
        assert_eq!(stats.top_fan_out.len(), 2);
        assert_eq!(stats.top_fan_out[0].def_id, DefId(3));
        assert_eq!(stats.top_fan_out[0].fan_out, 2);
        assert_eq!(stats.top_fan_out[1].name, "aardvark");
        assert_eq!(stats.indirect.high, 1);
        assert_eq!(stats.indirect.medium, 1);
        assert_eq!(stats.counts.transitive, 4);
        assert_eq!(stats.last_build.map(|b| b.build_id), Some(1));
    }
}
