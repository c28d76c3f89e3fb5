//! Indirect conflict detector.
//!
//! Finds mod interactions that only connect through the transitive reference
//! graph. Every finding is anchored at one shared entity; for each anchor the
//! highest-priority matching pattern of [`Pattern::CATALOG`] is emitted and
//! the rest are dropped.
//!
//! The pass is a pure read-then-emit scan over operations and transitive rows
//! already in memory. Operations whose target does not resolve cannot anchor
//! or be reached, so they are counted and skipped.

pub mod patterns;

pub use patterns::Pattern;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use modgraph_core::{
    DefId, EntityIndex, IndirectConflict, ModId, ModInfo, ModOperation, OperationKind,
    SeverityCounts, TransitiveReference,
};

use crate::config::EngineConfig;

/// Counts reported by one detector run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectSummary {
    pub counts: SeverityCounts,
    /// Emitted rows per pattern id.
    pub by_pattern: BTreeMap<String, usize>,
    /// Distinct resolved operation targets.
    pub anchors_evaluated: usize,
    pub operations_considered: usize,
    /// Operations with no resolvable target.
    pub operations_excluded: usize,
    /// Targets touched only by additive operations.
    pub additive_anchors: usize,
}

/// Rows and summary of one detector run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndirectOutcome {
    /// Rows, sorted by anchor id.
    pub conflicts: Vec<IndirectConflict>,
    pub summary: IndirectSummary,
}

/// A pattern match waiting for per-anchor arbitration.
struct Candidate {
    pattern: Pattern,
    mods: BTreeSet<ModId>,
    explanation: String,
}

/// Read-only view of the detector inputs.
pub struct IndirectDetector<'a> {
    index: &'a EntityIndex,
    config: EngineConfig,
    mod_names: HashMap<ModId, &'a str>,
    /// Direct operations per resolved target.
    by_target: BTreeMap<DefId, Vec<&'a ModOperation>>,
    /// Sources that reach each target, with depth.
    dependents: HashMap<DefId, Vec<(DefId, u32)>>,
    /// Distinct targets reachable from each source.
    fan_out: HashMap<DefId, usize>,
    excluded: usize,
}

impl<'a> IndirectDetector<'a> {
    pub fn new(
        index: &'a EntityIndex,
        operations: &'a [ModOperation],
        transitive: &[TransitiveReference],
        mods: &'a [ModInfo],
        config: EngineConfig,
    ) -> Self {
        let mut by_target: BTreeMap<DefId, Vec<&ModOperation>> = BTreeMap::new();
        let mut excluded = 0;
        for op in operations {
            match op.target().and_then(|(kind, name)| index.resolve(kind, name)) {
                Some(target) => by_target.entry(target).or_default().push(op),
                None => excluded += 1,
            }
        }

        let mut dependents: HashMap<DefId, Vec<(DefId, u32)>> = HashMap::new();
        let mut fan_out: HashMap<DefId, usize> = HashMap::new();
        for row in transitive {
            if row.source_def_id == row.target_def_id {
                continue;
            }
            dependents
                .entry(row.target_def_id)
                .or_default()
                .push((row.source_def_id, row.path_depth));
            *fan_out.entry(row.source_def_id).or_insert(0) += 1;
        }

        IndirectDetector {
            index,
            config,
            mod_names: mods.iter().map(|m| (m.id, m.name.as_str())).collect(),
            by_target,
            dependents,
            fan_out,
            excluded,
        }
    }

    /// Runs every pattern and arbitrates per anchor.
    pub fn detect(&self) -> IndirectOutcome {
        tracing::debug!(
            "indirect conflicts: {} anchors, {} unresolved operations",
            self.by_target.len(),
            self.excluded
        );

        let mut candidates: BTreeMap<DefId, Candidate> = BTreeMap::new();
        let mut offer = |anchor: DefId, candidate: Candidate| {
            let outranked = candidates
                .get(&anchor)
                .is_some_and(|current| current.pattern.priority() <= candidate.pattern.priority());
            if !outranked {
                candidates.insert(anchor, candidate);
            }
        };

        for (anchor, candidate) in self.remove_then_depend() {
            offer(anchor, candidate);
        }
        for (anchor, candidate) in self.write_write_shared_ancestor() {
            offer(anchor, candidate);
        }
        for (anchor, candidate) in self.chain_amplified() {
            offer(anchor, candidate);
        }

        let mut summary = IndirectSummary {
            anchors_evaluated: self.by_target.len(),
            operations_considered: self.by_target.values().map(Vec::len).sum(),
            operations_excluded: self.excluded,
            additive_anchors: self
                .by_target
                .iter()
                .filter(|(anchor, ops)| {
                    !candidates.contains_key(*anchor) && ops.iter().all(|op| op.operation.is_additive())
                })
                .count(),
            ..IndirectSummary::default()
        };

        let mut conflicts = Vec::with_capacity(candidates.len());
        for (anchor, candidate) in candidates {
            let Some(severity) = candidate.pattern.severity() else {
                continue;
            };
            summary.counts.record(severity);
            *summary
                .by_pattern
                .entry(candidate.pattern.id().to_string())
                .or_insert(0) += 1;
            conflicts.push(IndirectConflict {
                shared_entity_def_id: anchor,
                pattern_id: candidate.pattern.id().to_string(),
                pattern_name: candidate.pattern.name().to_string(),
                severity,
                explanation: candidate.explanation,
                involved_mod_ids: candidate.mods,
            });
        }

        tracing::info!(
            "indirect conflicts: {} high, {} medium, {} low ({} additive-only anchors skipped)",
            summary.counts.high,
            summary.counts.medium,
            summary.counts.low,
            summary.additive_anchors
        );
        IndirectOutcome { conflicts, summary }
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    /// A removal on E while definitions depend on E, or while other mods
    /// touch E or its dependents.
    fn remove_then_depend(&self) -> Vec<(DefId, Candidate)> {
        let mut found = Vec::new();
        for (&anchor, ops) in &self.by_target {
            let removers: BTreeSet<ModId> = ops
                .iter()
                .filter(|op| op.operation.is_removal())
                .map(|op| op.mod_id)
                .collect();
            if removers.is_empty() {
                continue;
            }

            let dependents = self.dependents.get(&anchor).map(Vec::as_slice).unwrap_or(&[]);
            let mut others: BTreeSet<ModId> = BTreeSet::new();
            let touched = std::iter::once(anchor).chain(dependents.iter().map(|(id, _)| *id));
            for def in touched {
                for op in self.by_target.get(&def).into_iter().flatten() {
                    if !removers.contains(&op.mod_id) {
                        others.insert(op.mod_id);
                    }
                }
            }
            if dependents.is_empty() && others.is_empty() {
                continue;
            }

            let entity = self.label(anchor);
            let remover_names = self.names(&removers);
            let explanation = if others.is_empty() {
                let nearest = dependents
                    .iter()
                    .min_by_key(|(id, depth)| (*depth, *id))
                    .map(|(id, _)| self.label(*id))
                    .unwrap_or_default();
                patterns::explain_remove_then_depend_alone(
                    &remover_names,
                    &entity,
                    dependents.len(),
                    &nearest,
                )
            } else {
                patterns::explain_remove_then_depend_shared(
                    &remover_names,
                    &entity,
                    &self.names(&others),
                    dependents.len(),
                )
            };

            let mods = removers.union(&others).copied().collect();
            found.push((
                anchor,
                Candidate {
                    pattern: Pattern::RemoveThenDepend,
                    mods,
                    explanation,
                },
            ));
        }
        found
    }

    /// Distinct mods writing the same property on different descendants of
    /// a common `extends` ancestor. Each pair is anchored at its nearest
    /// shared ancestor.
    ///
    /// Writes are bucketed per `(property, ancestor)` by the branch below
    /// the ancestor they sit on, so the pass is linear in writes times
    /// ancestry depth. Two writes have their nearest shared ancestor above
    /// the buckets unless both sit strictly inside the same branch.
    fn write_write_shared_ancestor(&self) -> Vec<(DefId, Candidate)> {
        #[derive(Default)]
        struct Overlap<'p> {
            mods: BTreeSet<ModId>,
            properties: BTreeSet<&'p str>,
            descendants: BTreeSet<DefId>,
        }

        /// `(child of the ancestor, whether the write is on that child)`.
        type Branch = (DefId, bool);
        type Writers = BTreeMap<DefId, BTreeSet<ModId>>;

        let mut buckets: BTreeMap<(&str, DefId), BTreeMap<Branch, Writers>> = BTreeMap::new();
        for (&target, ops) in &self.by_target {
            let mut ancestry: Option<Vec<(DefId, u32)>> = None;
            for op in ops {
                if !op.operation.is_write() {
                    continue;
                }
                let Some(property) = op.property_name.as_deref() else {
                    continue;
                };
                let chain = ancestry.get_or_insert_with(|| self.index.ancestors(target));
                let mut below = target;
                for &(ancestor, _) in chain.iter() {
                    buckets
                        .entry((property, ancestor))
                        .or_default()
                        .entry((below, below == target))
                        .or_default()
                        .entry(target)
                        .or_default()
                        .insert(op.mod_id);
                    below = ancestor;
                }
            }
        }

        let mut overlaps: BTreeMap<DefId, Overlap> = BTreeMap::new();
        for ((property, ancestor), branches) in &buckets {
            if branches.len() < 2 {
                continue;
            }
            let branch_mods: Vec<BTreeSet<ModId>> = branches
                .values()
                .map(|writers| writers.values().flatten().copied().collect())
                .collect();
            let mut spread: BTreeMap<ModId, usize> = BTreeMap::new();
            for mods in &branch_mods {
                for m in mods {
                    *spread.entry(*m).or_insert(0) += 1;
                }
            }

            for (writers, own) in branches.values().zip(&branch_mods) {
                let elsewhere: Vec<ModId> = spread
                    .iter()
                    .filter(|(m, n)| **n > usize::from(own.contains(*m)))
                    .map(|(m, _)| *m)
                    .collect();
                for (&target, mods) in writers {
                    if !mods.iter().any(|m| elsewhere.iter().any(|other| other != m)) {
                        continue;
                    }
                    let overlap = overlaps.entry(*ancestor).or_default();
                    overlap.mods.extend(mods.iter().copied());
                    overlap.properties.insert(*property);
                    overlap.descendants.insert(target);
                }
            }
        }

        overlaps
            .into_iter()
            .map(|(anchor, overlap)| {
                let properties: Vec<&str> = overlap.properties.into_iter().collect();
                let descendants: Vec<String> =
                    overlap.descendants.iter().map(|id| self.label(*id)).collect();
                let explanation = patterns::explain_write_write(
                    &self.names(&overlap.mods),
                    &properties,
                    &self.label(anchor),
                    &descendants,
                );
                (
                    anchor,
                    Candidate {
                        pattern: Pattern::WriteWriteSharedAncestor,
                        mods: overlap.mods,
                        explanation,
                    },
                )
            })
            .collect()
    }

    /// A single Remove whose target reaches more than the threshold.
    fn chain_amplified(&self) -> Vec<(DefId, Candidate)> {
        let threshold = self.config.fan_out_threshold;
        let mut found = Vec::new();
        for (&anchor, ops) in &self.by_target {
            let removers: BTreeSet<ModId> = ops
                .iter()
                .filter(|op| op.operation == OperationKind::Remove)
                .map(|op| op.mod_id)
                .collect();
            if removers.is_empty() {
                continue;
            }
            let fan_out = self.fan_out.get(&anchor).copied().unwrap_or(0);
            if fan_out <= threshold {
                continue;
            }
            let explanation = patterns::explain_chain_amplified(
                &self.names(&removers),
                &self.label(anchor),
                fan_out,
                threshold,
            );
            found.push((
                anchor,
                Candidate {
                    pattern: Pattern::ChainAmplifiedCaution,
                    mods: removers,
                    explanation,
                },
            ));
        }
        found
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Nearest ancestor shared by both chains, each at depth >= 1.
    fn label(&self, id: DefId) -> String {
        self.index
            .get(id)
            .map(|def| def.label())
            .unwrap_or_else(|| format!("definition #{id}"))
    }

    fn names(&self, mods: &BTreeSet<ModId>) -> Vec<String> {
        mods.iter()
            .map(|id| match self.mod_names.get(id) {
                Some(name) => name.to_string(),
                None => format!("mod #{id}"),
            })
            .collect()
    }
}

/// Runs the detector over materialised inputs.
pub fn detect_indirect(
    index: &EntityIndex,
    operations: &[ModOperation],
    transitive: &[TransitiveReference],
    mods: &[ModInfo],
    config: EngineConfig,
) -> IndirectOutcome {
    IndirectDetector::new(index, operations, transitive, mods, config).detect()
}
