//! ReferenceGraph: the resolved raw-reference graph.
//!
//! [`ReferenceGraph`] holds one node per definition and one edge per raw
//! [`Reference`] whose source and target both resolve (see
//! [`EntityIndex::resolve`]). Edge weights are the reference context labels.
//! The graph is the adjacency list the transitive builder expands from; it is
//! built once per graph build instead of re-scanning the raw edge table.
//!
//! Unresolvable references are not errors. They are counted in
//! [`ResolutionStats`] and left out of the graph, which terminates that
//! branch of any traversal at the unresolved hop.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::edge::Reference;
use crate::id::DefId;
use crate::index::EntityIndex;

/// How many unresolved target names [`ResolutionStats`] keeps as examples.
pub const UNRESOLVED_SAMPLE_LIMIT: usize = 10;

/// Edge resolution counters collected while building a [`ReferenceGraph`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Raw references seen.
    pub edges_total: usize,
    /// References added to the graph.
    pub edges_resolved: usize,
    /// References whose target name matched no definition.
    pub edges_unresolved: usize,
    /// References with no source id, or a source id missing from the index.
    pub edges_without_source: usize,
    /// First few unresolved targets, as `kind:name`.
    pub unresolved_samples: Vec<String>,
}

/// One step of a reference chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    pub def_id: DefId,
    /// Label of the edge that led here; `None` for the first hop.
    pub context: Option<String>,
}

/// Directed graph of resolved references between definitions.
#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    graph: DiGraph<DefId, String, u32>,
    nodes: HashMap<DefId, NodeIndex<u32>>,
    stats: ResolutionStats,
}

impl ReferenceGraph {
    /// Builds the graph from a definition index and the raw edge set.
    pub fn build(index: &EntityIndex, references: &[Reference]) -> Self {
        let mut graph = DiGraph::<DefId, String, u32>::with_capacity(index.len(), references.len());
        let mut nodes = HashMap::with_capacity(index.len());
        for def in index.definitions() {
            nodes.insert(def.id, graph.add_node(def.id));
        }

        let mut stats = ResolutionStats {
            edges_total: references.len(),
            ..ResolutionStats::default()
        };

        for reference in references {
            let source = match reference.source_def_id.and_then(|id| nodes.get(&id)) {
                Some(idx) => *idx,
                None => {
                    stats.edges_without_source += 1;
                    continue;
                }
            };
            match index.resolve(&reference.target_type, &reference.target_name) {
                Some(target_id) => {
                    graph.add_edge(source, nodes[&target_id], reference.context.clone());
                    stats.edges_resolved += 1;
                }
                None => {
                    stats.edges_unresolved += 1;
                    if stats.unresolved_samples.len() < UNRESOLVED_SAMPLE_LIMIT {
                        stats
                            .unresolved_samples
                            .push(format!("{}:{}", reference.target_type, reference.target_name));
                    }
                }
            }
        }

        ReferenceGraph {
            graph,
            nodes,
            stats,
        }
    }

    /// Returns a read-only reference to the underlying petgraph graph.
    pub fn graph(&self) -> &DiGraph<DefId, String, u32> {
        &self.graph
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    pub fn node_index(&self, id: DefId) -> Option<NodeIndex<u32>> {
        self.nodes.get(&id).copied()
    }

    pub fn def_id(&self, idx: NodeIndex<u32>) -> DefId {
        self.graph[idx]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing resolved edges of `idx` as `(target, context)`.
    pub fn outgoing(
        &self,
        idx: NodeIndex<u32>,
    ) -> impl Iterator<Item = (NodeIndex<u32>, &str)> + '_ {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.target(), edge.weight().as_str()))
    }

    /// Shortest chain of resolved references from `from` to `to`.
    ///
    /// Returns `None` if either id is unknown or `to` is unreachable. A
    /// path from a definition to itself is the single-hop `[from]`.
    pub fn shortest_path(&self, from: DefId, to: DefId) -> Option<Vec<PathHop>> {
        let start = self.node_index(from)?;
        let goal = self.node_index(to)?;
        if start == goal {
            return Some(vec![PathHop {
                def_id: from,
                context: None,
            }]);
        }

        let mut predecessor: HashMap<NodeIndex<u32>, (NodeIndex<u32>, &str)> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for (next, context) in self.outgoing(current) {
                if next == start || predecessor.contains_key(&next) {
                    continue;
                }
                predecessor.insert(next, (current, context));
                if next == goal {
                    return Some(self.unwind(start, goal, &predecessor));
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn unwind(
        &self,
        start: NodeIndex<u32>,
        goal: NodeIndex<u32>,
        predecessor: &HashMap<NodeIndex<u32>, (NodeIndex<u32>, &str)>,
    ) -> Vec<PathHop> {
        let mut hops = Vec::new();
        let mut current = goal;
        while current != start {
            let (prev, context) = predecessor[&current];
            hops.push(PathHop {
                def_id: self.def_id(current),
                context: Some(context.to_string()),
            });
            current = prev;
        }
        hops.push(PathHop {
            def_id: self.def_id(start),
            context: None,
        });
        hops.reverse();
        hops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Definition;

    fn chain_fixture() -> (EntityIndex, Vec<Reference>) {
        let index = EntityIndex::new(vec![
            Definition::new(1, "item", "A"),
            Definition::new(2, "item", "B"),
            Definition::new(3, "buff", "C"),
        ]);
        let refs = vec![
            Reference::new("item", 1, "item", "B", "recipe_ingredient"),
            Reference::new("item", 2, "buff", "C", "triggered_effect:AddBuff"),
            Reference::new("item", 1, "item", "Ghost", "loot_entry"),
        ];
        (index, refs)
    }

    #[test]
    fn build_counts_resolved_and_dangling_edges() {
        let (index, refs) = chain_fixture();
        let graph = ReferenceGraph::build(&index, &refs);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.stats().edges_total, 3);
        assert_eq!(graph.stats().edges_unresolved, 1);
        assert_eq!(graph.stats().unresolved_samples, vec!["item:Ghost".to_string()]);
    }

    #[test]
    fn edges_without_known_source_are_skipped() {
        let (index, _) = chain_fixture();
        let orphan = Reference::new("item", 99, "item", "A", "loot_entry");
        let mut anonymous = Reference::new("item", 1, "item", "A", "loot_entry");
        anonymous.source_def_id = None;
        let graph = ReferenceGraph::build(&index, &[orphan, anonymous]);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.stats().edges_without_source, 2);
    }

    #[test]
    fn shortest_path_reports_contexts() {
        let (index, refs) = chain_fixture();
        let graph = ReferenceGraph::build(&index, &refs);
        let path = graph.shortest_path(DefId(1), DefId(3)).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0].context, None);
        assert_eq!(path[1].context.as_deref(), Some("recipe_ingredient"));
        assert_eq!(path[2].def_id, DefId(3));
    }

    #[test]
    fn shortest_path_unreachable_is_none() {
        let (index, refs) = chain_fixture();
        let graph = ReferenceGraph::build(&index, &refs);
        assert!(graph.shortest_path(DefId(3), DefId(1)).is_none());
        assert!(graph.shortest_path(DefId(1), DefId(42)).is_none());
    }

    #[test]
    fn shortest_path_prefers_direct_edge() {
        let (index, mut refs) = chain_fixture();
        refs.push(Reference::new("item", 1, "buff", "C", "property:BuffName"));
        let graph = ReferenceGraph::build(&index, &refs);
        let path = graph.shortest_path(DefId(1), DefId(3)).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].context.as_deref(), Some("property:BuffName"));
    }
}
