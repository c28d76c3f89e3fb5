//! Property tests for the transitive reference builder.
//!
//! Random small graphs (cycles, self-loops and parallel edges included) are
//! checked against an all-pairs shortest path matrix.

use std::collections::{BTreeMap, BTreeSet};

use modgraph_core::{DefId, Definition, EntityIndex, Reference};
use modgraph_engine::build_transitive;
use proptest::prelude::*;

const MAX_NODES: usize = 8;
const MAX_EDGES: usize = 20;
const LABELS: [&str; 3] = ["extends", "loot_entry", "recipe_ingredient"];

/// `(node count, edges as (source, target, label index))`.
fn graph_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize, usize)>)> {
    (1usize..=MAX_NODES).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n, 0..LABELS.len()), 0..=MAX_EDGES),
        )
    })
}

fn inputs(n: usize, edges: &[(usize, usize, usize)]) -> (EntityIndex, Vec<Reference>) {
    let index = EntityIndex::new(
        (0..n)
            .map(|i| Definition::new(i as u64 + 1, "item", format!("n{i}")))
            .collect(),
    );
    let refs = edges
        .iter()
        .map(|&(s, t, l)| Reference::new("item", s as u64 + 1, "item", format!("n{t}"), LABELS[l]))
        .collect();
    (index, refs)
}

/// Shortest path lengths of at least one hop; `None` when unreachable.
fn distances(n: usize, edges: &[(usize, usize, usize)]) -> Vec<Vec<Option<u32>>> {
    let mut d = vec![vec![None; n]; n];
    for &(s, t, _) in edges {
        d[s][t] = Some(1);
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if let (Some(a), Some(b)) = (d[i][k], d[k][j]) {
                    if d[i][j].map_or(true, |cur| a + b < cur) {
                        d[i][j] = Some(a + b);
                    }
                }
            }
        }
    }
    d
}

/// Labels of `(s, t)` as the union over every shortest path.
fn expected_labels(
    n: usize,
    edges: &[(usize, usize, usize)],
    d: &[Vec<Option<u32>>],
    s: usize,
) -> BTreeMap<usize, BTreeSet<String>> {
    // Depth of `u` as a path prefix: the source itself counts as 0.
    let prefix = |u: usize| if u == s { Some(0) } else { d[s][u] };

    let mut targets: Vec<usize> = (0..n).filter(|&t| d[s][t].is_some()).collect();
    targets.sort_by_key(|&t| d[s][t]);

    let mut labels: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for t in targets {
        let depth = d[s][t];
        let mut set = BTreeSet::new();
        for &(u, v, l) in edges {
            if v != t || prefix(u).map(|p| p + 1) != depth {
                continue;
            }
            if u != s {
                set.extend(labels.get(&u).cloned().unwrap_or_default());
            }
            set.insert(LABELS[l].to_string());
        }
        labels.insert(t, set);
    }
    labels
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn depths_match_shortest_paths((n, edges) in graph_strategy()) {
        let (index, refs) = inputs(n, &edges);
        let outcome = build_transitive(&index, &refs);
        let d = distances(n, &edges);

        let expected: usize = d.iter().flatten().filter(|x| x.is_some()).count();
        prop_assert_eq!(outcome.rows.len(), expected);
        for row in &outcome.rows {
            let s = row.source_def_id.0 as usize - 1;
            let t = row.target_def_id.0 as usize - 1;
            prop_assert_eq!(Some(row.path_depth), d[s][t]);
        }
    }

    #[test]
    fn labels_are_the_union_over_shortest_paths((n, edges) in graph_strategy()) {
        let (index, refs) = inputs(n, &edges);
        let outcome = build_transitive(&index, &refs);
        let d = distances(n, &edges);

        for s in 0..n {
            let expected = expected_labels(n, &edges, &d, s);
            for row in outcome.rows.iter().filter(|r| r.source_def_id == DefId(s as u64 + 1)) {
                let t = row.target_def_id.0 as usize - 1;
                prop_assert_eq!(Some(&row.reference_types), expected.get(&t));
            }
        }
    }

    #[test]
    fn rebuilds_are_identical((n, edges) in graph_strategy()) {
        let (index, refs) = inputs(n, &edges);
        let first = build_transitive(&index, &refs);
        let second = build_transitive(&index, &refs);
        prop_assert_eq!(first.rows, second.rows);
        prop_assert_eq!(first.stats, second.stats);
    }
}

#[test]
fn complete_cyclic_graph_terminates_with_every_pair() {
    let n = MAX_NODES;
    let edges: Vec<(usize, usize, usize)> = (0..n)
        .flat_map(|s| (0..n).map(move |t| (s, t, 0)))
        .collect();
    let (index, refs) = inputs(n, &edges);
    let outcome = build_transitive(&index, &refs);
    assert_eq!(outcome.rows.len(), n * n);
    assert!(outcome.rows.iter().all(|r| r.path_depth == 1));
    assert_eq!(outcome.stats.self_reachable, n);
}
