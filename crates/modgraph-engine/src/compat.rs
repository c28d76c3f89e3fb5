//! Mod compatibility report.
//!
//! Combines three signals for a chosen set of mods:
//! - direct collisions: operations of two or more mods on the same target;
//! - Harmony patch conflicts, evaluated against the current snapshot;
//! - indirect conflicts of the last committed graph build.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use modgraph_core::{
    DefId, EntityIndex, IndirectConflict, ModId, ModInfo, ModOperation, PatchConflict, Severity,
    SeverityCounts,
};
use modgraph_storage::EntityStore;

use crate::error::EngineError;
use crate::patches::detect_patch_conflicts;

/// What a group of colliding operations points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum CollisionTarget {
    /// A resolved definition.
    Entity { def_id: DefId },
    /// An unresolved target, identified by its XML location.
    Xpath { file: String, xpath: String },
}

/// Operations of several mods on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectCollision {
    pub target: CollisionTarget,
    /// Display label of the target.
    pub label: String,
    pub severity: Severity,
    pub mod_ids: BTreeSet<ModId>,
    pub explanation: String,
}

/// Groups operations by target and reports every target touched by more
/// than one mod.
///
/// Targets touched only by additive operations are skipped. Operations
/// without a resolvable entity fall back to their file and xpath; those
/// with neither are ignored.
pub fn detect_direct_collisions(
    index: &EntityIndex,
    operations: &[ModOperation],
    mods: &[ModInfo],
) -> Vec<DirectCollision> {
    let names: HashMap<ModId, &str> = mods.iter().map(|m| (m.id, m.name.as_str())).collect();

    let mut groups: BTreeMap<CollisionTarget, Vec<&ModOperation>> = BTreeMap::new();
    for op in operations {
        let target = match op.target().and_then(|(kind, name)| index.resolve(kind, name)) {
            Some(def_id) => CollisionTarget::Entity { def_id },
            None => match &op.xpath {
                Some(xpath) => CollisionTarget::Xpath {
                    file: op.file_path.clone(),
                    xpath: xpath.clone(),
                },
                None => continue,
            },
        };
        groups.entry(target).or_default().push(op);
    }

    let mut collisions = Vec::new();
    for (target, ops) in groups {
        let mod_ids: BTreeSet<ModId> = ops.iter().map(|op| op.mod_id).collect();
        if mod_ids.len() < 2 || ops.iter().all(|op| op.operation.is_additive()) {
            continue;
        }

        let label = match &target {
            CollisionTarget::Entity { def_id } => index
                .get(*def_id)
                .map(|def| def.label())
                .unwrap_or_else(|| format!("definition #{def_id}")),
            CollisionTarget::Xpath { file, xpath } => format!("{file}:{xpath}"),
        };
        let severity = collision_severity(&ops);
        let mod_names: Vec<String> = mod_ids
            .iter()
            .map(|id| match names.get(id) {
                Some(name) => name.to_string(),
                None => format!("mod #{id}"),
            })
            .collect();
        let kinds: BTreeSet<&str> = ops.iter().map(|op| op.operation.as_str()).collect();
        let explanation = format!(
            "{} all modify {label} ({})",
            crate::indirect::patterns::join_names(&mod_names),
            kinds.into_iter().collect::<Vec<_>>().join(", ")
        );

        collisions.push(DirectCollision {
            target,
            label,
            severity,
            mod_ids,
            explanation,
        });
    }
    collisions
}

/// High on any removal, Medium when two mods write one property.
fn collision_severity(ops: &[&ModOperation]) -> Severity {
    if ops.iter().any(|op| op.operation.is_removal()) {
        return Severity::High;
    }
    let mut writers: HashMap<&str, BTreeSet<ModId>> = HashMap::new();
    for op in ops.iter().filter(|op| op.operation.is_write()) {
        if let Some(property) = op.property_name.as_deref() {
            writers.entry(property).or_default().insert(op.mod_id);
        }
    }
    if writers.values().any(|mods| mods.len() > 1) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// One entry of a compatibility report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "conflict", rename_all = "snake_case")]
pub enum Finding {
    Patch(PatchConflict),
    Direct(DirectCollision),
    Indirect(IndirectConflict),
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::Patch(c) => c.severity,
            Finding::Direct(c) => c.severity,
            Finding::Indirect(c) => c.severity,
        }
    }

    pub fn mod_ids(&self) -> &BTreeSet<ModId> {
        match self {
            Finding::Patch(c) => &c.mod_ids,
            Finding::Direct(c) => &c.mod_ids,
            Finding::Indirect(c) => &c.involved_mod_ids,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Finding::Patch(c) => &c.explanation,
            Finding::Direct(c) => &c.explanation,
            Finding::Indirect(c) => &c.explanation,
        }
    }

    /// Kept when at least `min(2, involved)` of its mods are selected.
    fn concerns(&self, selected: &BTreeSet<ModId>) -> bool {
        let involved = self.mod_ids();
        let hits = involved.intersection(selected).count();
        hits > 0 && hits >= involved.len().min(2)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// No findings at all.
    pub compatible: bool,
    /// No high-severity findings.
    pub compatible_with_caveats: bool,
}

impl CompatSummary {
    fn from_counts(counts: SeverityCounts) -> Self {
        CompatSummary {
            total: counts.total(),
            high: counts.high,
            medium: counts.medium,
            low: counts.low,
            compatible: counts.total() == 0,
            compatible_with_caveats: counts.high == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatReport {
    pub mods: Vec<ModInfo>,
    /// Findings, worst first.
    pub findings: Vec<Finding>,
    pub summary: CompatSummary,
}

impl CompatReport {
    /// 0 clean, 1 medium findings, 2 high findings.
    pub fn exit_status(&self) -> i32 {
        if self.summary.high > 0 {
            2
        } else if self.summary.medium > 0 {
            1
        } else {
            0
        }
    }
}

/// Checks the named mods against each other.
///
/// Fails with [`EngineError::ModNotFound`] for the first unknown name.
pub fn check_compatibility<S: EntityStore>(
    store: &S,
    mod_names: &[String],
) -> Result<CompatReport, EngineError> {
    let known = store.list_mods()?;
    let mut selected_mods = Vec::new();
    for name in mod_names {
        let info = known
            .iter()
            .find(|m| &m.name == name)
            .ok_or_else(|| EngineError::ModNotFound { name: name.clone() })?;
        if !selected_mods.contains(info) {
            selected_mods.push(info.clone());
        }
    }
    let selected: BTreeSet<ModId> = selected_mods.iter().map(|m| m.id).collect();
    tracing::debug!("compatibility check over {} mods", selected.len());

    let snapshot = store.load_snapshot()?;
    let graph = store.load_graph()?;
    let index = EntityIndex::new(snapshot.definitions);

    let patch = detect_patch_conflicts(&snapshot.patches, snapshot.class_hierarchy.as_ref());
    let direct = detect_direct_collisions(&index, &snapshot.operations, &snapshot.mods);

    let mut findings: Vec<Finding> = patch
        .conflicts
        .into_iter()
        .map(Finding::Patch)
        .chain(direct.into_iter().map(Finding::Direct))
        .chain(graph.indirect_conflicts.into_iter().map(Finding::Indirect))
        .filter(|finding| finding.concerns(&selected))
        .collect();
    findings.sort_by_key(|finding| std::cmp::Reverse(finding.severity()));

    let summary = CompatSummary::from_counts(findings.iter().map(Finding::severity).collect());
    tracing::info!(
        "compatibility: {} findings ({} high, {} medium, {} low)",
        summary.total,
        summary.high,
        summary.medium,
        summary.low
    );
    Ok(CompatReport {
        mods: selected_mods,
        findings,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use modgraph_core::{Definition, OperationKind};

    fn mods() -> Vec<ModInfo> {
        (1..=3)
            .map(|i| ModInfo { id: ModId(i), name: format!("Mod{i}") })
            .collect()
    }

    fn index() -> EntityIndex {
        EntityIndex::new(vec![
            Definition::new(1, "item", "gunPistol"),
            Definition::new(2, "block", "cntCar"),
        ])
    }

    #[test]
    fn two_writers_of_one_property_are_medium() {
        let ops = vec![
            ModOperation::new(1, OperationKind::Set, "item", "gunPistol").on_property("DamageEntity"),
            ModOperation::new(2, OperationKind::Set, "item", "gunPistol").on_property("DamageEntity"),
        ];
        let collisions = detect_direct_collisions(&index(), &ops, &mods());
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].severity, Severity::Medium);
        assert_eq!(collisions[0].label, "item 'gunPistol'");
        assert_eq!(collisions[0].explanation, "Mod1 and Mod2 all modify item 'gunPistol' (set)");
    }

    #[test]
    fn removal_is_high_and_distinct_properties_are_low() {
        let ops = vec![
            ModOperation::new(1, OperationKind::Set, "item", "gunPistol").on_property("Weight"),
            ModOperation::new(2, OperationKind::Set, "item", "gunPistol").on_property("Stacknumber"),
            ModOperation::new(1, OperationKind::Append, "block", "cntCar"),
            ModOperation::new(3, OperationKind::Remove, "block", "cntCar"),
        ];
        let collisions = detect_direct_collisions(&index(), &ops, &mods());
        let severities: Vec<Severity> = collisions.iter().map(|c| c.severity).collect();
        assert_eq!(severities, vec![Severity::Low, Severity::High]);
    }

    #[test]
    fn additive_only_and_single_mod_targets_are_skipped() {
        let ops = vec![
            ModOperation::new(1, OperationKind::Append, "item", "gunPistol"),
            ModOperation::new(2, OperationKind::InsertAfter, "item", "gunPistol"),
            ModOperation::new(3, OperationKind::Remove, "block", "cntCar"),
            ModOperation::new(3, OperationKind::Set, "block", "cntCar").on_property("Map.Color"),
        ];
        assert!(detect_direct_collisions(&index(), &ops, &mods()).is_empty());
    }

    #[test]
    fn unresolved_targets_group_by_xpath() {
        let mut a = ModOperation::new(1, OperationKind::Remove, "item", "ghost");
        a.xpath = Some("/items/item[@name='ghost']".into());
        a.file_path = "items.xml".into();
        let mut b = a.clone();
        b.mod_id = ModId(2);
        b.operation = OperationKind::SetAttribute;
        let collisions = detect_direct_collisions(&index(), &[a, b], &mods());
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].label, "items.xml:/items/item[@name='ghost']");
        assert_eq!(collisions[0].severity, Severity::High);
    }

    #[test]
    fn findings_need_two_selected_mods_unless_only_one_is_involved() {
        let pair = Finding::Direct(DirectCollision {
            target: CollisionTarget::Entity { def_id: DefId(1) },
            label: String::new(),
            severity: Severity::Low,
            mod_ids: BTreeSet::from([ModId(1), ModId(2)]),
            explanation: String::new(),
        });
        assert!(pair.concerns(&BTreeSet::from([ModId(1), ModId(2)])));
        assert!(!pair.concerns(&BTreeSet::from([ModId(1), ModId(3)])));

        let single = Finding::Direct(DirectCollision {
            mod_ids: BTreeSet::from([ModId(3)]),
            ..match &pair {
                Finding::Direct(c) => c.clone(),
                _ => unreachable!(),
            }
        });
        assert!(single.concerns(&BTreeSet::from([ModId(3)])));
        assert!(!single.concerns(&BTreeSet::from([ModId(1)])));
    }

    #[test]
    fn summary_flags_caveats() {
        let caveats = CompatSummary::from_counts([Severity::Medium, Severity::Low].into_iter().collect());
        assert!(!caveats.compatible);
        assert!(caveats.compatible_with_caveats);
        let clean = CompatSummary::from_counts(SeverityCounts::default());
        assert!(clean.compatible);
    }
}
