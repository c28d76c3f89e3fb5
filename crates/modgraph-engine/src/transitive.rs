//! Transitive reference builder.
//!
//! Computes the closure of the resolved raw-reference graph: one
//! [`TransitiveReference`] per reachable `(source, target)` pair, carrying
//! the minimum hop count and the union of edge labels over every shortest
//! path.
//!
//! Each definition seeds its own breadth-first expansion over the
//! [`ReferenceGraph`] adjacency. The expansion proceeds one depth layer at a
//! time:
//!
//! - a node first reached at depth `d` keeps `d` and is expanded once more;
//! - a node reached again at the same depth only merges labels;
//! - a node reached again at a greater depth is ignored.
//!
//! The source itself is never re-expanded. When a cycle leads back to it,
//! the self-pair is recorded at the first depth that closes the cycle. Every
//! node is therefore expanded at most once per source, which bounds a run by
//! `O(D × E)` even on cyclic data.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use modgraph_core::{DefId, EntityIndex, Reference, ReferenceGraph, ResolutionStats, TransitiveReference};

/// Counts reported by one closure run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitiveStats {
    pub definitions_processed: usize,
    pub edges: ResolutionStats,
    pub pairs_derived: usize,
    /// Definitions that reach themselves through a cycle.
    pub self_reachable: usize,
    pub max_depth: u32,
}

/// Closure rows and the counts describing how they were derived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitiveOutcome {
    /// Rows, sorted by `(source, target)`.
    pub rows: Vec<TransitiveReference>,
    pub stats: TransitiveStats,
}

/// Per-node state of one expansion.
struct Reached {
    depth: u32,
    labels: BTreeSet<String>,
}

/// Expands single sources over a prebuilt [`ReferenceGraph`].
pub struct TransitiveBuilder<'g> {
    graph: &'g ReferenceGraph,
}

impl<'g> TransitiveBuilder<'g> {
    pub fn new(graph: &'g ReferenceGraph) -> Self {
        TransitiveBuilder { graph }
    }

    /// Closure rows with `source` as the source, sorted by target id.
    ///
    /// Returns an empty list for an id the graph does not contain.
    pub fn from_source(&self, source: DefId) -> Vec<TransitiveReference> {
        let Some(start) = self.graph.node_index(source) else {
            return Vec::new();
        };

        let mut reached: HashMap<NodeIndex<u32>, Reached> = HashMap::new();
        let mut self_pair: Option<Reached> = None;
        let mut frontier = vec![start];
        let mut depth = 0u32;

        while !frontier.is_empty() {
            depth += 1;
            let mut next = Vec::new();

            for &node in &frontier {
                let inherited = if node == start {
                    BTreeSet::new()
                } else {
                    reached
                        .get(&node)
                        .map(|r| r.labels.clone())
                        .unwrap_or_default()
                };

                for (target, context) in self.graph.outgoing(node) {
                    if target == start {
                        match self_pair.as_mut() {
                            None => {
                                self_pair = Some(Reached {
                                    depth,
                                    labels: with_label(&inherited, context),
                                })
                            }
                            Some(pair) if pair.depth == depth => {
                                pair.labels.extend(inherited.iter().cloned());
                                pair.labels.insert(context.to_string());
                            }
                            Some(_) => {}
                        }
                        continue;
                    }

                    match reached.get_mut(&target) {
                        None => {
                            reached.insert(
                                target,
                                Reached {
                                    depth,
                                    labels: with_label(&inherited, context),
                                },
                            );
                            next.push(target);
                        }
                        Some(existing) if existing.depth == depth => {
                            existing.labels.extend(inherited.iter().cloned());
                            existing.labels.insert(context.to_string());
                        }
                        Some(_) => {}
                    }
                }
            }

            frontier = next;
        }

        let mut rows: Vec<TransitiveReference> = reached
            .into_iter()
            .map(|(node, r)| TransitiveReference {
                source_def_id: source,
                target_def_id: self.graph.def_id(node),
                path_depth: r.depth,
                reference_types: r.labels,
            })
            .collect();
        if let Some(pair) = self_pair {
            rows.push(TransitiveReference {
                source_def_id: source,
                target_def_id: source,
                path_depth: pair.depth,
                reference_types: pair.labels,
            });
        }
        rows.sort_by_key(|row| row.target_def_id);
        rows
    }

    /// Closure rows for every definition in the graph, sorted by
    /// `(source, target)`.
    pub fn build_all(&self) -> TransitiveOutcome {
        let mut sources: Vec<DefId> = self
            .graph
            .graph()
            .node_indices()
            .map(|idx| self.graph.def_id(idx))
            .collect();
        sources.sort();

        let mut stats = TransitiveStats {
            definitions_processed: sources.len(),
            edges: self.graph.stats().clone(),
            ..TransitiveStats::default()
        };

        let mut rows = Vec::new();
        for source in sources {
            for row in self.from_source(source) {
                if row.source_def_id == row.target_def_id {
                    stats.self_reachable += 1;
                }
                stats.max_depth = stats.max_depth.max(row.path_depth);
                rows.push(row);
            }
        }
        stats.pairs_derived = rows.len();

        TransitiveOutcome { rows, stats }
    }
}

fn with_label(inherited: &BTreeSet<String>, context: &str) -> BTreeSet<String> {
    let mut labels = inherited.clone();
    labels.insert(context.to_string());
    labels
}

/// Resolves `references` against `index` and computes the full closure.
pub fn build_transitive(index: &EntityIndex, references: &[Reference]) -> TransitiveOutcome {
    tracing::debug!(
        "transitive closure: {} definitions, {} raw references",
        index.len(),
        references.len()
    );
    let graph = ReferenceGraph::build(index, references);
    let outcome = TransitiveBuilder::new(&graph).build_all();
    tracing::info!(
        "transitive closure: {} definitions, {}/{} edges resolved, {} pairs (max depth {})",
        outcome.stats.definitions_processed,
        outcome.stats.edges.edges_resolved,
        outcome.stats.edges.edges_total,
        outcome.stats.pairs_derived,
        outcome.stats.max_depth
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    use modgraph_core::Definition;

    fn defs(names: &[&str]) -> EntityIndex {
        EntityIndex::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| Definition::new(i as u64 + 1, "item", *name))
                .collect(),
        )
    }

    fn edge(source: u64, target: &str, context: &str) -> Reference {
        Reference::new("item", source, "item", target, context)
    }

    fn row(rows: &[TransitiveReference], source: u64, target: u64) -> Option<&TransitiveReference> {
        rows.iter()
            .find(|r| r.source_def_id == DefId(source) && r.target_def_id == DefId(target))
    }

    #[test]
    fn shortcut_edge_wins_depth() {
        // A -> B -> C -> D plus A -> D.
        let index = defs(&["A", "B", "C", "D"]);
        let refs = vec![
            edge(1, "B", "extends"),
            edge(2, "C", "extends"),
            edge(3, "D", "extends"),
            edge(1, "D", "loot_entry"),
        ];
        let outcome = build_transitive(&index, &refs);
        let ad = row(&outcome.rows, 1, 4).unwrap();
        assert_eq!(ad.path_depth, 1);
        assert_eq!(ad.reference_types, BTreeSet::from(["loot_entry".to_string()]));
        assert_eq!(row(&outcome.rows, 1, 3).unwrap().path_depth, 2);
        assert_eq!(outcome.stats.pairs_derived, 6);
    }

    #[test]
    fn two_cycle_records_self_pairs() {
        let index = defs(&["A", "B"]);
        let refs = vec![edge(1, "B", "triggered_effect:AddBuff"), edge(2, "A", "triggered_effect:AddBuff")];
        let outcome = build_transitive(&index, &refs);
        assert_eq!(outcome.rows.len(), 4);
        assert_eq!(row(&outcome.rows, 1, 2).unwrap().path_depth, 1);
        assert_eq!(row(&outcome.rows, 1, 1).unwrap().path_depth, 2);
        assert_eq!(row(&outcome.rows, 2, 2).unwrap().path_depth, 2);
        assert_eq!(outcome.stats.self_reachable, 2);
    }

    #[test]
    fn self_loop_is_depth_one() {
        let index = defs(&["A"]);
        let outcome = build_transitive(&index, &[edge(1, "A", "group_member")]);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].path_depth, 1);
    }

    #[test]
    fn dangling_edge_contributes_nothing() {
        let index = defs(&["A", "B"]);
        let refs = vec![edge(1, "Ghost", "loot_entry"), edge(1, "B", "extends")];
        let outcome = build_transitive(&index, &refs);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].target_def_id, DefId(2));
        assert_eq!(outcome.stats.edges.edges_unresolved, 1);
        assert_eq!(outcome.stats.edges.unresolved_samples, vec!["item:Ghost".to_string()]);
    }

    #[test]
    fn equal_depth_paths_union_labels() {
        // A -extends-> B -loot-> D and A -recipe-> C -loot-> D.
        let index = defs(&["A", "B", "C", "D"]);
        let refs = vec![
            edge(1, "B", "extends"),
            edge(1, "C", "recipe_ingredient"),
            edge(2, "D", "loot_entry"),
            edge(3, "D", "loot_entry"),
        ];
        let outcome = build_transitive(&index, &refs);
        let ad = row(&outcome.rows, 1, 4).unwrap();
        assert_eq!(ad.path_depth, 2);
        let labels: Vec<&str> = ad.reference_types.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["extends", "loot_entry", "recipe_ingredient"]);
    }

    #[test]
    fn rows_are_sorted_by_source_then_target() {
        let index = defs(&["A", "B", "C"]);
        let refs = vec![edge(3, "A", "extends"), edge(1, "C", "extends"), edge(1, "B", "extends")];
        let outcome = build_transitive(&index, &refs);
        let keys: Vec<(u64, u64)> = outcome
            .rows
            .iter()
            .map(|r| (r.source_def_id.0, r.target_def_id.0))
            .collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (1, 3), (3, 1), (3, 2), (3, 3)]);
    }
}
