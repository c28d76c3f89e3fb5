//! Deterministic content fingerprints of derived graph tables using blake3.
//!
//! A graph build must produce the same rows for the same input, though row
//! iteration order may differ. The fingerprint is therefore computed over a
//! canonical form:
//!
//! - **Level 1**: each row is hashed from its `serde_json` encoding (all
//!   set-valued fields are `BTreeSet`, so the encoding is canonical)
//! - **Level 2**: row hashes of one table are sorted and composed into a
//!   table hash
//! - **Level 3**: the three table hashes compose into the build fingerprint
//!
//! Two builds with equal row sets always share a fingerprint.

use serde::Serialize;

use crate::error::StorageError;
use crate::types::GraphTables;

/// Hashes one row from its canonical JSON encoding.
pub fn hash_row<T: Serialize>(row: &T) -> Result<blake3::Hash, StorageError> {
    let bytes = serde_json::to_vec(row)?;
    Ok(blake3::hash(&bytes))
}

/// Composes the row hashes of one table, independent of row order.
pub fn hash_table<T: Serialize>(rows: &[T]) -> Result<blake3::Hash, StorageError> {
    let mut row_hashes = rows.iter().map(hash_row).collect::<Result<Vec<_>, _>>()?;
    row_hashes.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

    let mut hasher = blake3::Hasher::new();
    hasher.update(&(row_hashes.len() as u64).to_le_bytes());
    for hash in &row_hashes {
        hasher.update(hash.as_bytes());
    }
    Ok(hasher.finalize())
}

/// Fingerprint of a complete set of derived tables.
pub fn fingerprint_graph(tables: &GraphTables) -> Result<blake3::Hash, StorageError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"transitive");
    hasher.update(hash_table(&tables.transitive)?.as_bytes());
    hasher.update(b"indirect");
    hasher.update(hash_table(&tables.indirect_conflicts)?.as_bytes());
    hasher.update(b"patch");
    hasher.update(hash_table(&tables.patch_conflicts)?.as_bytes());
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use modgraph_core::{DefId, TransitiveReference};

    fn row(source: u64, target: u64, depth: u32, labels: &[&str]) -> TransitiveReference {
        TransitiveReference {
            source_def_id: DefId(source),
            target_def_id: DefId(target),
            path_depth: depth,
            reference_types: labels.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn table_hash_ignores_row_order() {
        let a = vec![row(1, 2, 1, &["extends"]), row(2, 3, 1, &["loot_entry"])];
        let b = vec![row(2, 3, 1, &["loot_entry"]), row(1, 2, 1, &["extends"])];
        assert_eq!(hash_table(&a).unwrap(), hash_table(&b).unwrap());
    }

    #[test]
    fn table_hash_sees_depth_and_label_changes() {
        let base = vec![row(1, 2, 1, &["extends"])];
        let deeper = vec![row(1, 2, 2, &["extends"])];
        let relabeled = vec![row(1, 2, 1, &["extends", "loot_entry"])];
        let h = hash_table(&base).unwrap();
        assert_ne!(h, hash_table(&deeper).unwrap());
        assert_ne!(h, hash_table(&relabeled).unwrap());
    }

    #[test]
    fn empty_tables_hash_differently_per_table() {
        let only_transitive = GraphTables {
            transitive: vec![row(1, 2, 1, &["extends"])],
            ..GraphTables::default()
        };
        assert_ne!(
            fingerprint_graph(&GraphTables::default()).unwrap(),
            fingerprint_graph(&only_transitive).unwrap()
        );
    }
}
