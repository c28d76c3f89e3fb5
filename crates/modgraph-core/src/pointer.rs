//! Property-driven pointers.
//!
//! Some property values name another definition. Which kind they point at
//! depends only on the property name, so a fixed table covers them:
//! `SpawnEntityName` always names an `entity_class`, `BuffName` a `buff`, and
//! so on. Values may list several names separated by commas.

use std::collections::HashSet;

use crate::edge::{Reference, CONTEXT_PROPERTY_PREFIX};
use crate::node::{Definition, Property};
use crate::types::EntityKind;

/// Property name → kind of the definition its value names.
const POINTER_TABLE: &[(&str, EntityKind)] = &[
    ("SpawnEntityName", EntityKind::EntityClass),
    ("EntityGroup", EntityKind::EntityGroup),
    ("BuffName", EntityKind::Buff),
    ("AddBuff", EntityKind::Buff),
    ("RemoveBuff", EntityKind::Buff),
    ("LootList", EntityKind::LootContainer),
    ("LootGroup", EntityKind::LootGroup),
    ("HandItem", EntityKind::Item),
    ("CreateItem", EntityKind::Item),
    ("RepairTools", EntityKind::Item),
    ("Material", EntityKind::Material),
    ("UnlockedBy", EntityKind::Progression),
    ("UpgradeBlock", EntityKind::Block),
    ("DowngradeBlock", EntityKind::Block),
];

/// Returns the target kind for a pointer property, or `None` for plain
/// value properties.
pub fn pointer_kind(property_name: &str) -> Option<EntityKind> {
    POINTER_TABLE
        .iter()
        .find(|(name, _)| *name == property_name)
        .map(|(_, kind)| kind.clone())
}

/// Edge label for a pointer property.
pub fn pointer_context(property_name: &str) -> String {
    format!("{CONTEXT_PROPERTY_PREFIX}{property_name}")
}

/// Splits a pointer value into the names it lists.
pub fn pointer_targets(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Derives `property:<Name>` references for pointer properties that the
/// parsing stage did not already emit as references.
///
/// `owner` resolves a property's definition id; properties of unknown
/// definitions are skipped.
pub fn derive_pointer_references<'a>(
    properties: &[Property],
    existing: &[Reference],
    owner: impl Fn(&Property) -> Option<&'a Definition>,
) -> Vec<Reference> {
    let mut seen: HashSet<(u64, String, String)> = existing
        .iter()
        .filter_map(|r| {
            r.source_def_id
                .map(|id| (id.0, r.context.clone(), r.target_name.clone()))
        })
        .collect();

    let mut derived = Vec::new();
    for property in properties {
        let Some(kind) = pointer_kind(&property.name) else {
            continue;
        };
        let Some(value) = property.value.as_deref() else {
            continue;
        };
        let Some(def) = owner(property) else {
            continue;
        };
        let context = pointer_context(&property.name);
        for target in pointer_targets(value) {
            if !seen.insert((def.id.0, context.clone(), target.to_string())) {
                continue;
            }
            derived.push(Reference {
                source_type: def.kind.clone(),
                source_def_id: Some(def.id),
                source_file: def.file.clone(),
                line: property.line,
                target_type: kind.clone(),
                target_name: target.to_string(),
                context: context.clone(),
            });
        }
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntityIndex;

    #[test]
    fn table_lookup() {
        assert_eq!(pointer_kind("SpawnEntityName"), Some(EntityKind::EntityClass));
        assert_eq!(pointer_kind("BuffName"), Some(EntityKind::Buff));
        assert_eq!(pointer_kind("Stacknumber"), None);
    }

    #[test]
    fn list_values_split_on_commas() {
        let names: Vec<&str> = pointer_targets("buffA, buffB,,buffC ").collect();
        assert_eq!(names, vec!["buffA", "buffB", "buffC"]);
    }

    #[test]
    fn derives_missing_pointer_edges_only() {
        let index = EntityIndex::new(vec![Definition::new(1, "entity_class", "zombieBoe")]);
        let properties = vec![
            Property::new(1, "HandItem", "meleeHandZombie01"),
            Property::new(1, "BuffName", "buffInfection, buffBleeding"),
            Property::new(1, "WalkType", "7"),
            Property::new(42, "HandItem", "orphanItem"),
        ];
        let existing = vec![Reference::new(
            "entity_class",
            1,
            "item",
            "meleeHandZombie01",
            "property:HandItem",
        )];

        let derived = derive_pointer_references(&properties, &existing, |p| index.get(p.definition_id));

        let targets: Vec<(&str, &str)> = derived
            .iter()
            .map(|r| (r.context.as_str(), r.target_name.as_str()))
            .collect();
        assert_eq!(
            targets,
            vec![
                ("property:BuffName", "buffInfection"),
                ("property:BuffName", "buffBleeding"),
            ]
        );
        assert!(derived.iter().all(|r| r.target_type == EntityKind::Buff));
    }
}
