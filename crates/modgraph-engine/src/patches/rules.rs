//! Patch conflict rules.
//!
//! Pairwise rules look at two patches on the same `(class, method)` target;
//! [`inheritance_overlap`] pairs patches across a base and a derived class;
//! [`ordering_cycles`] runs a cycle check over the `before`/`after` hints of
//! one target.

use std::collections::BTreeSet;

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use modgraph_core::{ModId, PatchConflict, PatchConflictKind, PatchRecord, PatchType, Severity};

fn mods_of<'p>(patches: impl IntoIterator<Item = &'p PatchRecord>) -> BTreeSet<ModId> {
    patches.into_iter().map(|p| p.mod_id).collect()
}

/// High when both sides mutate shared state.
fn state_severity(a: &PatchRecord, b: &PatchRecord) -> Severity {
    if a.modifies_state && b.modifies_state {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// High when either side writes the result without a guard.
fn guard_severity<'p>(patches: impl IntoIterator<Item = &'p PatchRecord>) -> Severity {
    if patches.into_iter().any(PatchRecord::unguarded_result_write) {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn pair_conflict(
    kind: PatchConflictKind,
    severity: Severity,
    a: &PatchRecord,
    b: &PatchRecord,
    explanation: String,
) -> PatchConflict {
    PatchConflict {
        kind,
        severity,
        target_class: a.target_class.clone(),
        target_method: a.target_method.clone(),
        related_class: None,
        mod_ids: mods_of([a, b]),
        patch_classes: vec![a.patch_class.clone(), b.patch_class.clone()],
        explanation,
    }
}

fn is_wrapper(p: &PatchRecord) -> bool {
    matches!(p.patch_type, PatchType::Prefix | PatchType::Postfix)
}

/// Prefix/postfix patches of different mods where at least one mutates
/// the result or shared state.
pub fn collision(a: &PatchRecord, b: &PatchRecord) -> Option<PatchConflict> {
    if a.mod_id == b.mod_id || !is_wrapper(a) || !is_wrapper(b) {
        return None;
    }
    let mutates = |p: &PatchRecord| p.modifies_result || p.modifies_state;
    if !mutates(a) && !mutates(b) {
        return None;
    }
    Some(pair_conflict(
        PatchConflictKind::Collision,
        state_severity(a, b),
        a,
        b,
        format!(
            "{} and {} both wrap {} and mutate its result or state",
            a.patch_class,
            b.patch_class,
            a.target_label()
        ),
    ))
}

/// Transpilers of two different mods on one target.
pub fn transpiler_conflict(a: &PatchRecord, b: &PatchRecord) -> Option<PatchConflict> {
    if a.mod_id == b.mod_id
        || a.patch_type != PatchType::Transpiler
        || b.patch_type != PatchType::Transpiler
    {
        return None;
    }
    Some(pair_conflict(
        PatchConflictKind::TranspilerConflict,
        state_severity(a, b),
        a,
        b,
        format!(
            "{} and {} both rewrite the body of {}",
            a.patch_class,
            b.patch_class,
            a.target_label()
        ),
    ))
}

/// A short-circuiting prefix next to another mod's patch.
pub fn skip_conflict(a: &PatchRecord, b: &PatchRecord) -> Option<PatchConflict> {
    if a.mod_id == b.mod_id {
        return None;
    }
    let (skipper, skipped) = if a.short_circuits() {
        (a, b)
    } else if b.short_circuits() {
        (b, a)
    } else {
        return None;
    };
    Some(pair_conflict(
        PatchConflictKind::SkipConflict,
        Severity::High,
        a,
        b,
        format!(
            "{} can skip {} and with it {}",
            skipper.patch_class,
            skipper.target_label(),
            skipped.patch_class
        ),
    ))
}

/// Every pairwise rule, in output order.
pub const PAIR_RULES: [fn(&PatchRecord, &PatchRecord) -> Option<PatchConflict>; 3] =
    [collision, transpiler_conflict, skip_conflict];

/// A patch on a base-class method and another mod's patch on the same
/// method of a derived class.
pub fn inheritance_overlap(base: &PatchRecord, derived: &PatchRecord) -> Option<PatchConflict> {
    if base.mod_id == derived.mod_id || base.target_method != derived.target_method {
        return None;
    }
    Some(PatchConflict {
        kind: PatchConflictKind::InheritanceOverlap,
        severity: guard_severity([base, derived]),
        target_class: base.target_class.clone(),
        target_method: base.target_method.clone(),
        related_class: Some(derived.target_class.clone()),
        mod_ids: mods_of([base, derived]),
        patch_classes: vec![base.patch_class.clone(), derived.patch_class.clone()],
        explanation: format!(
            "{} patches {} and {} patches {}, which inherits from {}",
            base.patch_class,
            base.target_label(),
            derived.patch_class,
            derived.target_label(),
            base.target_class
        ),
    })
}

/// Ordering cycles among patches sharing one target.
///
/// `p.before ∋ q` adds `p → q`, `p.after ∋ q` adds `q → p`. Each strongly
/// connected component that is a real cycle and spans at least two mods is
/// one conflict. Hints naming patches outside `group` cannot close a cycle
/// here and are ignored.
pub fn ordering_cycles(group: &[&PatchRecord]) -> Vec<PatchConflict> {
    if group.iter().filter(|p| p.has_ordering_hints()).count() < 2 {
        return Vec::new();
    }

    let mut graph = DiGraph::<usize, ()>::with_capacity(group.len(), 0);
    let nodes: Vec<_> = (0..group.len()).map(|i| graph.add_node(i)).collect();
    for (i, p) in group.iter().enumerate() {
        for (j, q) in group.iter().enumerate() {
            if p.before.as_ref().is_some_and(|names| names.contains(&q.patch_class)) {
                graph.update_edge(nodes[i], nodes[j], ());
            }
            if p.after.as_ref().is_some_and(|names| names.contains(&q.patch_class)) {
                graph.update_edge(nodes[j], nodes[i], ());
            }
        }
    }

    let mut conflicts = Vec::new();
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|&n| graph.find_edge(n, n).is_some());
        if !is_cycle {
            continue;
        }
        let mut members: Vec<usize> = component.iter().map(|&n| graph[n]).collect();
        members.sort_unstable();
        let patches: Vec<&PatchRecord> = members.iter().map(|&i| group[i]).collect();
        let mod_ids = mods_of(patches.iter().copied());
        if mod_ids.len() < 2 {
            continue;
        }
        let patch_classes: Vec<String> = patches.iter().map(|p| p.patch_class.clone()).collect();
        conflicts.push(PatchConflict {
            kind: PatchConflictKind::OrderConflict,
            severity: guard_severity(patches.iter().copied()),
            target_class: patches[0].target_class.clone(),
            target_method: patches[0].target_method.clone(),
            related_class: None,
            mod_ids,
            explanation: format!(
                "ordering hints of {} on {} cannot all be satisfied",
                patch_classes.join(", "),
                patches[0].target_label()
            ),
            patch_classes,
        });
    }
    conflicts.sort_by(|a, b| a.patch_classes.cmp(&b.patch_classes));
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(mod_id: u64, class: &str, kind: PatchType) -> PatchRecord {
        PatchRecord::new(mod_id, class, "EntityAlive", "DamageEntity", kind)
    }

    #[test]
    fn collision_needs_a_mutation_and_two_mods() {
        let mut a = patch(1, "A", PatchType::Prefix);
        let b = patch(2, "B", PatchType::Postfix);
        assert!(collision(&a, &b).is_none());

        a.modifies_result = true;
        assert_eq!(collision(&a, &b).unwrap().severity, Severity::Medium);

        let mut c = patch(1, "C", PatchType::Postfix);
        c.modifies_state = true;
        assert!(collision(&a, &c).is_none(), "same mod");
    }

    #[test]
    fn collision_is_high_when_both_mutate_state() {
        let mut a = patch(1, "A", PatchType::Prefix);
        let mut b = patch(2, "B", PatchType::Postfix);
        a.modifies_state = true;
        b.modifies_state = true;
        assert_eq!(collision(&a, &b).unwrap().severity, Severity::High);
    }

    #[test]
    fn transpilers_of_two_mods_conflict() {
        let a = patch(1, "A", PatchType::Transpiler);
        let b = patch(2, "B", PatchType::Transpiler);
        let conflict = transpiler_conflict(&a, &b).unwrap();
        assert_eq!(conflict.kind, PatchConflictKind::TranspilerConflict);
        assert_eq!(conflict.severity, Severity::Medium);
        assert!(transpiler_conflict(&a, &patch(2, "C", PatchType::Prefix)).is_none());
    }

    #[test]
    fn transpilers_of_one_mod_do_not_conflict() {
        let a = patch(1, "A", PatchType::Transpiler);
        let b = patch(1, "B", PatchType::Transpiler);
        assert!(transpiler_conflict(&a, &b).is_none());
    }

    #[test]
    fn transpilers_mutating_state_are_high() {
        let mut a = patch(1, "A", PatchType::Transpiler);
        let mut b = patch(2, "B", PatchType::Transpiler);
        a.modifies_state = true;
        assert_eq!(transpiler_conflict(&a, &b).unwrap().severity, Severity::Medium);
        b.modifies_state = true;
        assert_eq!(transpiler_conflict(&a, &b).unwrap().severity, Severity::High);
    }

    #[test]
    fn short_circuit_prefix_skips_the_other_patch() {
        let mut a = patch(1, "SkipDamage", PatchType::Prefix);
        a.returns_bool = true;
        let b = patch(2, "LogDamage", PatchType::Postfix);
        let conflict = skip_conflict(&b, &a).unwrap();
        assert_eq!(conflict.severity, Severity::High);
        assert_eq!(conflict.mod_ids, BTreeSet::from([ModId(1), ModId(2)]));
        assert!(conflict.explanation.starts_with("SkipDamage can skip"));
    }

    #[test]
    fn inheritance_overlap_is_high_for_unguarded_result_writes() {
        let base = PatchRecord::new(1, "A", "EntityAlive", "OnUpdateLive", PatchType::Postfix);
        let mut derived = PatchRecord::new(2, "B", "EntityZombie", "OnUpdateLive", PatchType::Prefix);
        assert_eq!(inheritance_overlap(&base, &derived).unwrap().severity, Severity::Medium);
        derived.modifies_result = true;
        let conflict = inheritance_overlap(&base, &derived).unwrap();
        assert_eq!(conflict.severity, Severity::High);
        assert_eq!(conflict.related_class.as_deref(), Some("EntityZombie"));
    }

    #[test]
    fn mutual_before_hints_form_one_cycle() {
        let mut a = patch(1, "A", PatchType::Prefix);
        let mut b = patch(2, "B", PatchType::Prefix);
        let c = patch(3, "C", PatchType::Prefix);
        a.before = Some(BTreeSet::from(["B".to_string()]));
        b.before = Some(BTreeSet::from(["A".to_string()]));
        let conflicts = ordering_cycles(&[&a, &b, &c]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].patch_classes, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn consistent_hints_are_not_a_cycle() {
        let mut a = patch(1, "A", PatchType::Prefix);
        let mut b = patch(2, "B", PatchType::Prefix);
        a.before = Some(BTreeSet::from(["B".to_string()]));
        b.after = Some(BTreeSet::from(["A".to_string()]));
        assert!(ordering_cycles(&[&a, &b]).is_empty());
    }

    #[test]
    fn before_and_after_can_contradict() {
        // A before B, but A also after B.
        let mut a = patch(1, "A", PatchType::Prefix);
        let mut b = patch(2, "B", PatchType::Postfix);
        a.before = Some(BTreeSet::from(["B".to_string()]));
        a.after = Some(BTreeSet::from(["B".to_string()]));
        b.after = Some(BTreeSet::from(["Unrelated".to_string()]));
        let conflicts = ordering_cycles(&[&a, &b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, PatchConflictKind::OrderConflict);
    }
}
