//! Harmony-style patch conflict detector.
//!
//! A rule engine over [`PatchRecord`] rows, independent of the XML-side
//! reference graph. Patches are grouped by `(target class, target method)`
//! and each group runs:
//!
//! - the pairwise rules ([`rules::PAIR_RULES`]): one row per matching
//!   unordered pair;
//! - the ordering cycle check ([`rules::ordering_cycles`]): one row per cycle.
//!
//! Inheritance overlaps pair groups whose classes are related in the
//! decompiled [`ClassHierarchy`]. Without a hierarchy that rule is skipped
//! and a [`BuildWarning::MissingExternalInput`] is reported; every other rule
//! still runs.

pub mod rules;

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use modgraph_core::{ClassHierarchy, PatchConflict, PatchRecord, SeverityCounts};

use crate::diagnostics::BuildWarning;

/// Counts reported by one detector run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSummary {
    pub counts: SeverityCounts,
    /// Emitted rows per conflict kind.
    pub by_kind: BTreeMap<String, usize>,
    pub patches: usize,
    /// Distinct `(class, method)` targets.
    pub targets: usize,
    /// Whether the inheritance rule ran.
    pub hierarchy_available: bool,
}

/// Rows, summary and warnings of one detector run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchOutcome {
    pub conflicts: Vec<PatchConflict>,
    pub summary: PatchSummary,
    pub warnings: Vec<BuildWarning>,
}

/// Patches grouped by target, in first-seen order.
fn group_by_target(patches: &[PatchRecord]) -> IndexMap<(&str, &str), Vec<&PatchRecord>> {
    let mut groups: IndexMap<(&str, &str), Vec<&PatchRecord>> = IndexMap::new();
    for patch in patches {
        groups
            .entry((patch.target_class.as_str(), patch.target_method.as_str()))
            .or_default()
            .push(patch);
    }
    groups
}

/// Runs every rule over `patches`.
pub fn detect_patch_conflicts(
    patches: &[PatchRecord],
    hierarchy: Option<&ClassHierarchy>,
) -> PatchOutcome {
    let groups = group_by_target(patches);
    tracing::debug!(
        "patch conflicts: {} patches on {} targets",
        patches.len(),
        groups.len()
    );

    let mut conflicts = Vec::new();
    for group in groups.values() {
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                conflicts.extend(rules::PAIR_RULES.iter().filter_map(|rule| rule(a, b)));
            }
        }
        conflicts.extend(rules::ordering_cycles(group));
    }

    let mut warnings = Vec::new();
    match hierarchy {
        Some(hierarchy) => conflicts.extend(inheritance_overlaps(&groups, hierarchy)),
        None if !patches.is_empty() => {
            tracing::warn!("no class hierarchy imported; skipping inheritance overlap detection");
            warnings.push(BuildWarning::MissingExternalInput {
                input: "class_hierarchy".to_string(),
                rule: "InheritanceOverlap".to_string(),
            });
        }
        None => {}
    }

    let mut summary = PatchSummary {
        patches: patches.len(),
        targets: groups.len(),
        hierarchy_available: hierarchy.is_some(),
        ..PatchSummary::default()
    };
    for conflict in &conflicts {
        summary.counts.record(conflict.severity);
        *summary
            .by_kind
            .entry(conflict.kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    tracing::info!(
        "patch conflicts: {} high, {} medium, {} low across {} targets",
        summary.counts.high,
        summary.counts.medium,
        summary.counts.low,
        summary.targets
    );
    PatchOutcome {
        conflicts,
        summary,
        warnings,
    }
}

/// Pairs every base-class group with the derived-class groups patching a
/// method of the same name.
fn inheritance_overlaps(
    groups: &IndexMap<(&str, &str), Vec<&PatchRecord>>,
    hierarchy: &ClassHierarchy,
) -> Vec<PatchConflict> {
    let mut by_method: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, (class_method, _)) in groups.iter().enumerate() {
        by_method.entry(class_method.1).or_default().push(pos);
    }

    let mut conflicts = Vec::new();
    for (pos, ((class, method), base_group)) in groups.iter().enumerate() {
        let Some(candidates) = by_method.get(method) else {
            continue;
        };
        for &other in candidates {
            if other == pos {
                continue;
            }
            let Some(((derived_class, _), derived_group)) = groups.get_index(other) else {
                continue;
            };
            if !hierarchy.is_ancestor(class, derived_class) {
                continue;
            }
            for base in base_group {
                for derived in derived_group {
                    conflicts.extend(rules::inheritance_overlap(base, derived));
                }
            }
        }
    }
    conflicts
}
