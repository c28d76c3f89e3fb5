//! Full graph rebuild.
//!
//! Loads the snapshot, runs the transitive builder, then both conflict
//! detectors, and hands every derived table to the store in one
//! [`EntityStore::replace_graph`] call. Nothing is written before all three
//! passes have finished, so a failed build leaves the previous tables in
//! place.

use serde::{Deserialize, Serialize};

use modgraph_core::{EntityIndex, Severity, SeverityCounts};
use modgraph_storage::{BuildRecord, EntityStore, GraphTables};

use crate::config::EngineConfig;
use crate::diagnostics::BuildWarning;
use crate::error::EngineError;
use crate::indirect::{detect_indirect, IndirectSummary};
use crate::patches::{detect_patch_conflicts, PatchSummary};
use crate::transitive::{build_transitive, TransitiveStats};

/// Everything a build reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub transitive: TransitiveStats,
    pub indirect: IndirectSummary,
    pub patches: PatchSummary,
    pub warnings: Vec<BuildWarning>,
    pub build: BuildRecord,
}

impl BuildReport {
    /// Indirect and patch findings together.
    pub fn findings(&self) -> SeverityCounts {
        let mut counts = self.indirect.counts;
        counts.merge(self.patches.counts);
        counts
    }

    /// 0 clean, 1 medium findings, 2 high findings.
    pub fn exit_status(&self) -> i32 {
        match self.findings().worst() {
            Some(Severity::High) => 2,
            Some(Severity::Medium) => 1,
            _ => 0,
        }
    }
}

/// Rebuilds every derived table of `store`.
pub fn build_dependency_graph<S: EntityStore>(
    store: &mut S,
    config: EngineConfig,
) -> Result<BuildReport, EngineError> {
    tracing::debug!("graph build: loading snapshot");
    let snapshot = store.load_snapshot()?;
    let index = EntityIndex::new(snapshot.definitions);

    let transitive = build_transitive(&index, &snapshot.references);
    let indirect = detect_indirect(
        &index,
        &snapshot.operations,
        &transitive.rows,
        &snapshot.mods,
        config,
    );
    let patches = detect_patch_conflicts(&snapshot.patches, snapshot.class_hierarchy.as_ref());

    let mut warnings = Vec::new();
    let edges = &transitive.stats.edges;
    if edges.edges_unresolved > 0 {
        warnings.push(BuildWarning::UnresolvedReference {
            count: edges.edges_unresolved,
            samples: edges.unresolved_samples.clone(),
        });
    }
    if edges.edges_without_source > 0 {
        warnings.push(BuildWarning::MissingSource {
            count: edges.edges_without_source,
        });
    }
    if indirect.summary.operations_excluded > 0 {
        warnings.push(BuildWarning::UnanchoredOperations {
            count: indirect.summary.operations_excluded,
        });
    }
    warnings.extend(patches.warnings);
    for warning in &warnings {
        tracing::warn!("graph build: {warning}");
    }

    let tables = GraphTables {
        transitive: transitive.rows,
        indirect_conflicts: indirect.conflicts,
        patch_conflicts: patches.conflicts,
    };
    tracing::debug!("graph build: replacing derived tables");
    let build = store.replace_graph(&tables)?;
    tracing::info!(
        "graph build {} committed: {} pairs, {} indirect, {} patch conflicts ({})",
        build.build_id,
        build.transitive_count,
        build.indirect_conflict_count,
        build.patch_conflict_count,
        build.fingerprint
    );

    Ok(BuildReport {
        transitive: transitive.stats,
        indirect: indirect.summary,
        patches: patches.summary,
        warnings,
        build,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use modgraph_core::{Definition, ModInfo, ModOperation, OperationKind, Reference};
    use modgraph_storage::{InMemoryStore, Snapshot};

    fn snapshot(operations: Vec<ModOperation>) -> Snapshot {
        Snapshot {
            definitions: vec![
                Definition::new(1, "item", "woodFrame").extending("woodBlock"),
                Definition::new(2, "block", "woodBlock"),
            ],
            references: vec![
                Reference::new("item", 1, "block", "woodBlock", "extends"),
                Reference::new("item", 1, "item", "ghost", "recipe_ingredient"),
            ],
            mods: vec![ModInfo { id: modgraph_core::ModId(1), name: "ModA".into() }],
            operations,
            ..Snapshot::default()
        }
    }

    #[test]
    fn removal_build_exits_high() {
        let ops = vec![ModOperation::new(1, OperationKind::Remove, "block", "woodBlock")];
        let mut store = InMemoryStore::with_snapshot(snapshot(ops)).unwrap();
        let report = build_dependency_graph(&mut store, EngineConfig::default()).unwrap();
        assert_eq!(report.exit_status(), 2);
        assert_eq!(report.build.transitive_count, 1);
        assert_eq!(report.build.indirect_conflict_count, 1);
    }

    #[test]
    fn clean_build_reports_warnings_and_exits_zero() {
        let ops = vec![ModOperation::new(1, OperationKind::Append, "item", "nowhere")];
        let mut store = InMemoryStore::with_snapshot(snapshot(ops)).unwrap();
        let report = build_dependency_graph(&mut store, EngineConfig::default()).unwrap();
        assert_eq!(report.exit_status(), 0);
        assert!(report.warnings.contains(&BuildWarning::UnresolvedReference {
            count: 1,
            samples: vec!["item:ghost".to_string()],
        }));
        assert!(report
            .warnings
            .contains(&BuildWarning::UnanchoredOperations { count: 1 }));
    }

    #[test]
    fn rebuilds_of_unchanged_input_share_a_fingerprint() {
        let ops = vec![ModOperation::new(1, OperationKind::Remove, "block", "woodBlock")];
        let mut store = InMemoryStore::with_snapshot(snapshot(ops)).unwrap();
        let first = build_dependency_graph(&mut store, EngineConfig::default()).unwrap();
        let second = build_dependency_graph(&mut store, EngineConfig::default()).unwrap();
        assert_eq!(first.build.fingerprint, second.build.fingerprint);
        assert_eq!(second.build.build_id, first.build.build_id + 1);
    }
}
