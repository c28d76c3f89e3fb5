//! Import of parser and mod-scanner output into an [`EntityStore`].
//!
//! An [`ImportBundle`] is the JSON document the external parsing and
//! mod-scanning stages hand over. Ingestion normalises it into a
//! [`Snapshot`]:
//!
//! - properties of unknown definitions are dropped and counted;
//! - `property:<Name>` references are derived for pointer properties the
//!   parser did not already emit;
//! - every mod operation without a scanner-supplied impact status gets one,
//!   computed once against this snapshot. It is never revisited after a
//!   graph build.
//!
//! Two definitions sharing an id reject the whole bundle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use modgraph_core::pointer::derive_pointer_references;
use modgraph_core::{
    ClassEdge, ClassHierarchy, DefId, Definition, EntityIndex, ImpactStatus, ModInfo, ModOperation,
    OperationKind, PatchRecord, Property, Reference,
};
use modgraph_storage::{EntityStore, Snapshot};

use crate::error::EngineError;

/// Parser and mod-scanner output, as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBundle {
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub mods: Vec<ModInfo>,
    #[serde(default, alias = "modOperations")]
    pub operations: Vec<ModOperation>,
    #[serde(default, alias = "patchRecords")]
    pub patches: Vec<PatchRecord>,
    /// Decompiled class hierarchy; absent when decompilation was skipped.
    #[serde(default)]
    pub class_hierarchy: Option<Vec<ClassEdge>>,
}

impl ImportBundle {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Counts collected while ingesting one bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub definitions: usize,
    pub properties: usize,
    pub orphan_properties: usize,
    pub references: usize,
    pub pointer_references: usize,
    pub mods: usize,
    pub operations: usize,
    pub safe: usize,
    pub caution: usize,
    pub conflict: usize,
    /// Operations whose impact status came with the bundle.
    pub supplied_status: usize,
    pub patches: usize,
    /// `None` when the bundle carried no class hierarchy.
    pub class_edges: Option<usize>,
}

impl IngestStats {
    fn record(&mut self, status: ImpactStatus, supplied: bool) {
        if supplied {
            self.supplied_status += 1;
        }
        match status {
            ImpactStatus::Safe => self.safe += 1,
            ImpactStatus::Caution => self.caution += 1,
            ImpactStatus::Conflict => self.conflict += 1,
        }
    }
}

/// Classifies one operation against the snapshot.
///
/// `inbound` counts raw references resolving to each definition.
pub fn classify_impact(
    op: &ModOperation,
    index: &EntityIndex,
    inbound: &HashMap<DefId, usize>,
) -> ImpactStatus {
    if op.operation.is_additive() {
        return ImpactStatus::Safe;
    }
    let Some(target) = op.target().and_then(|(kind, name)| index.resolve(kind, name)) else {
        return ImpactStatus::Safe;
    };
    match op.operation {
        OperationKind::Remove | OperationKind::RemoveAttribute => {
            if inbound.get(&target).copied().unwrap_or(0) > 0 {
                ImpactStatus::Conflict
            } else {
                ImpactStatus::Caution
            }
        }
        _ => ImpactStatus::Caution,
    }
}

/// Counts resolvable inbound references per definition.
fn inbound_counts(index: &EntityIndex, references: &[Reference]) -> HashMap<DefId, usize> {
    let mut inbound = HashMap::new();
    for r in references {
        if let Some(target) = index.resolve(&r.target_type, &r.target_name) {
            *inbound.entry(target).or_insert(0) += 1;
        }
    }
    inbound
}

/// Rejects definitions that share an id.
fn check_unique_ids(definitions: &[Definition]) -> Result<(), EngineError> {
    let mut seen: HashMap<DefId, &Definition> = HashMap::with_capacity(definitions.len());
    for def in definitions {
        if let Some(first) = seen.insert(def.id, def) {
            return Err(EngineError::InvalidBundle {
                reason: format!(
                    "duplicate definition id {}: {} '{}' and {} '{}'",
                    def.id, first.kind, first.name, def.kind, def.name
                ),
            });
        }
    }
    Ok(())
}

/// Normalises a bundle into a snapshot.
pub fn ingest(bundle: ImportBundle) -> Result<(Snapshot, IngestStats), EngineError> {
    let ImportBundle {
        definitions,
        properties,
        mut references,
        mods,
        mut operations,
        patches,
        class_hierarchy,
    } = bundle;

    check_unique_ids(&definitions)?;
    let index = EntityIndex::new(definitions);
    let mut stats = IngestStats {
        definitions: index.len(),
        mods: mods.len(),
        patches: patches.len(),
        ..IngestStats::default()
    };

    let (properties, orphans): (Vec<Property>, Vec<Property>) = properties
        .into_iter()
        .partition(|p| index.contains(p.definition_id));
    if !orphans.is_empty() {
        tracing::warn!(
            "dropping {} propert(ies) of unknown definitions (first: {} on {})",
            orphans.len(),
            orphans[0].name,
            orphans[0].definition_id
        );
    }
    stats.properties = properties.len();
    stats.orphan_properties = orphans.len();

    let derived = derive_pointer_references(&properties, &references, |p| index.get(p.definition_id));
    stats.pointer_references = derived.len();
    references.extend(derived);
    stats.references = references.len();

    let inbound = inbound_counts(&index, &references);
    for op in &mut operations {
        let supplied = op.impact_status.is_some();
        let status = match op.impact_status {
            Some(status) => status,
            None => classify_impact(op, &index, &inbound),
        };
        op.impact_status = Some(status);
        stats.record(status, supplied);
    }
    stats.operations = operations.len();

    let class_hierarchy = class_hierarchy.map(|edges| {
        stats.class_edges = Some(edges.len());
        ClassHierarchy::from_edges(edges)
    });

    tracing::info!(
        "ingested {} definitions, {} references ({} derived), {} operations ({} conflict, {} caution), {} patches",
        stats.definitions,
        stats.references,
        stats.pointer_references,
        stats.operations,
        stats.conflict,
        stats.caution,
        stats.patches
    );

    let snapshot = Snapshot {
        definitions: index.definitions().to_vec(),
        properties,
        references,
        mods,
        operations,
        patches,
        class_hierarchy,
    };
    Ok((snapshot, stats))
}

/// Ingests `bundle` and replaces the store's base tables with it.
pub fn import_bundle<S: EntityStore>(
    store: &mut S,
    bundle: ImportBundle,
) -> Result<IngestStats, EngineError> {
    let (snapshot, stats) = ingest(bundle)?;
    store.save_snapshot(&snapshot)?;
    Ok(stats)
}
