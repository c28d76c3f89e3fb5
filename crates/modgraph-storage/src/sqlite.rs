//! SQLite implementation of [`EntityStore`].
//!
//! [`SqliteStore`] persists snapshots and graph builds in a SQLite database
//! with WAL mode, one transaction per write call, and automatic schema
//! migrations. Set-valued columns are stored as JSON TEXT via serde_json.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, Row};

use modgraph_core::{
    ClassEdge, ClassHierarchy, CoreError, DefId, Definition, EntityKind, ImpactStatus,
    IndirectConflict, ModId, ModInfo, ModOperation, OperationKind, PatchConflict,
    PatchConflictKind, PatchRecord, PatchType, Property, Reference, Severity, TransitiveReference,
};

use crate::error::StorageError;
use crate::hash::fingerprint_graph;
use crate::memory::check_snapshot;
use crate::schema::{self, Location};
use crate::traits::EntityStore;
use crate::types::{BuildRecord, GraphTables, Snapshot, StoreCounts};

/// `snapshot_meta` key recording that a class hierarchy was imported, so an
/// empty hierarchy can be told apart from a missing one.
const META_CLASS_HIERARCHY: &str = "class_hierarchy";

/// Derived tables, cleared together.
const DERIVED_TABLES: [&str; 3] = ["transitive_references", "indirect_conflicts", "patch_conflicts"];

/// Base tables, children first.
const BASE_TABLES: [&str; 8] = [
    "properties",
    "definitions",
    "refs",
    "mod_operations",
    "patch_records",
    "mods",
    "class_hierarchy",
    "snapshot_meta",
];

/// SQLite-backed implementation of [`EntityStore`].
///
/// Every write operation is wrapped in a transaction for atomicity.
/// The database uses WAL mode, so a reader on another connection keeps seeing
/// the last committed build while a rebuild is being written.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = schema::open(Location::File(path))?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = schema::open(Location::Memory)?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn definition_from_row(row: &Row<'_>) -> rusqlite::Result<Definition> {
        let kind: String = row.get(1)?;
        Ok(Definition {
            id: DefId(row.get(0)?),
            kind: EntityKind::from(kind),
            name: row.get(2)?,
            file: row.get(3)?,
            line: row.get(4)?,
            extends: row.get(5)?,
        })
    }

    fn transitive_from_row(row: &Row<'_>) -> rusqlite::Result<(u64, u64, u32, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn decode_transitive(
        (source, target, depth, labels_json): (u64, u64, u32, String),
    ) -> Result<TransitiveReference, StorageError> {
        let reference_types: BTreeSet<String> = serde_json::from_str(&labels_json)?;
        Ok(TransitiveReference {
            source_def_id: DefId(source),
            target_def_id: DefId(target),
            path_depth: depth,
            reference_types,
        })
    }

    fn query_transitive(
        &self,
        sql: &str,
        id: DefId,
    ) -> Result<Vec<TransitiveReference>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![id.0], Self::transitive_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(Self::decode_transitive(row?)?);
        }
        Ok(result)
    }

    fn indirect_from_row(
        row: &Row<'_>,
    ) -> rusqlite::Result<(u64, String, String, String, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode_indirect(
        (def_id, pattern_id, pattern_name, severity, explanation, mods_json): (
            u64,
            String,
            String,
            String,
            String,
            String,
        ),
    ) -> Result<IndirectConflict, StorageError> {
        let involved_mod_ids: BTreeSet<ModId> = serde_json::from_str(&mods_json)?;
        Ok(IndirectConflict {
            shared_entity_def_id: DefId(def_id),
            pattern_id,
            pattern_name,
            severity: parse_severity(&severity)?,
            explanation,
            involved_mod_ids,
        })
    }

    fn count(&self, table: &str) -> Result<usize, StorageError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn parse_severity(s: &str) -> Result<Severity, StorageError> {
    Severity::parse(s).ok_or_else(|| {
        CoreError::InvalidValue {
            field: "severity",
            value: s.to_string(),
        }
        .into()
    })
}

fn invalid(field: &'static str, value: &str) -> StorageError {
    CoreError::InvalidValue {
        field,
        value: value.to_string(),
    }
    .into()
}

fn optional_set_json(set: &Option<BTreeSet<String>>) -> Result<Option<String>, StorageError> {
    set.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(StorageError::from)
}

fn optional_set_from_json(json: Option<String>) -> Result<Option<BTreeSet<String>>, StorageError> {
    json.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(StorageError::from)
}

impl EntityStore for SqliteStore {
    // -----------------------------------------------------------------------
    // Base tables
    // -----------------------------------------------------------------------

    fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        check_snapshot(snapshot)?;
        let tx = self.conn.transaction()?;

        for table in DERIVED_TABLES.iter().chain(BASE_TABLES.iter()) {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.execute("DELETE FROM graph_builds", [])?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO definitions (id, def_type, name, file, line, extends) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for def in &snapshot.definitions {
                stmt.execute(params![
                    def.id.0,
                    def.kind.as_str(),
                    def.name,
                    def.file,
                    def.line,
                    def.extends,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO properties (definition_id, name, value, class, line) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for prop in &snapshot.properties {
                stmt.execute(params![
                    prop.definition_id.0,
                    prop.name,
                    prop.value,
                    prop.class,
                    prop.line,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO refs (source_type, source_def_id, source_file, line, target_type, target_name, context) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in &snapshot.references {
                stmt.execute(params![
                    r.source_type.as_str(),
                    r.source_def_id.map(|id| id.0),
                    r.source_file,
                    r.line,
                    r.target_type.as_str(),
                    r.target_name,
                    r.context,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached("INSERT INTO mods (id, name) VALUES (?1, ?2)")?;
            for m in &snapshot.mods {
                stmt.execute(params![m.id.0, m.name])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO mod_operations (mod_id, operation, target_type, target_name, property_name, new_value, xpath, file_path, line, impact_status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for op in &snapshot.operations {
                stmt.execute(params![
                    op.mod_id.0,
                    op.operation.as_str(),
                    op.target_type.as_ref().map(|k| k.as_str()),
                    op.target_name,
                    op.property_name,
                    op.new_value,
                    op.xpath,
                    op.file_path,
                    op.line,
                    op.impact_status.as_ref().map(ImpactStatus::as_str),
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO patch_records (mod_id, patch_class, target_class, target_method, patch_type, target_member_kind, priority, before_json, after_json, returns_bool, modifies_result, modifies_state, is_guarded, is_dynamic, source_file, line) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;
            for p in &snapshot.patches {
                stmt.execute(params![
                    p.mod_id.0,
                    p.patch_class,
                    p.target_class,
                    p.target_method,
                    p.patch_type.as_str(),
                    p.target_member_kind,
                    p.priority,
                    optional_set_json(&p.before)?,
                    optional_set_json(&p.after)?,
                    p.returns_bool,
                    p.modifies_result,
                    p.modifies_state,
                    p.is_guarded,
                    p.is_dynamic,
                    p.source_file,
                    p.line,
                ])?;
            }
        }

        if let Some(hierarchy) = &snapshot.class_hierarchy {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO class_hierarchy (class_name, parent_name) VALUES (?1, ?2)",
            )?;
            for edge in hierarchy.edges() {
                stmt.execute(params![edge.class, edge.parent])?;
            }
            tx.execute(
                "INSERT INTO snapshot_meta (key, value) VALUES (?1, 'present')",
                params![META_CLASS_HIERARCHY],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Snapshot, StorageError> {
        let definitions: Vec<Definition> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, def_type, name, file, line, extends FROM definitions ORDER BY id",
            )?;
            let rows = stmt.query_map([], Self::definition_from_row)?;
            rows.collect::<Result<_, _>>()?
        };

        let properties: Vec<Property> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT definition_id, name, value, class, line FROM properties ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Property {
                    definition_id: DefId(row.get(0)?),
                    name: row.get(1)?,
                    value: row.get(2)?,
                    class: row.get(3)?,
                    line: row.get(4)?,
                })
            })?;
            rows.collect::<Result<_, _>>()?
        };

        let references: Vec<Reference> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT source_type, source_def_id, source_file, line, target_type, target_name, context FROM refs ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                let source_type: String = row.get(0)?;
                let source_def_id: Option<u64> = row.get(1)?;
                let target_type: String = row.get(4)?;
                Ok(Reference {
                    source_type: EntityKind::from(source_type),
                    source_def_id: source_def_id.map(DefId),
                    source_file: row.get(2)?,
                    line: row.get(3)?,
                    target_type: EntityKind::from(target_type),
                    target_name: row.get(5)?,
                    context: row.get(6)?,
                })
            })?;
            rows.collect::<Result<_, _>>()?
        };

        let mods = self.list_mods()?;

        let operations: Vec<ModOperation> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT mod_id, operation, target_type, target_name, property_name, new_value, xpath, file_path, line, impact_status FROM mod_operations ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                let mod_id: u64 = row.get(0)?;
                let operation: String = row.get(1)?;
                let target_type: Option<String> = row.get(2)?;
                let impact: Option<String> = row.get(9)?;
                Ok((
                    mod_id,
                    operation,
                    target_type,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, u32>(8)?,
                    impact,
                ))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (
                    mod_id,
                    operation,
                    target_type,
                    target_name,
                    property_name,
                    new_value,
                    xpath,
                    file_path,
                    line,
                    impact,
                ) = row?;
                result.push(ModOperation {
                    mod_id: ModId(mod_id),
                    operation: OperationKind::parse(&operation)
                        .ok_or_else(|| invalid("operation", &operation))?,
                    target_type: target_type.map(EntityKind::from),
                    target_name,
                    property_name,
                    new_value,
                    xpath,
                    file_path,
                    line,
                    impact_status: impact
                        .map(|s| ImpactStatus::parse(&s).ok_or_else(|| invalid("impact_status", &s)))
                        .transpose()?,
                });
            }
            result
        };

        let patches: Vec<PatchRecord> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT mod_id, patch_class, target_class, target_method, patch_type, target_member_kind, priority, before_json, after_json, returns_bool, modifies_result, modifies_state, is_guarded, is_dynamic, source_file, line FROM patch_records ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                let mod_id: u64 = row.get(0)?;
                let patch_type: String = row.get(4)?;
                let before: Option<String> = row.get(7)?;
                let after: Option<String> = row.get(8)?;
                let record = PatchRecord {
                    mod_id: ModId(mod_id),
                    patch_class: row.get(1)?,
                    target_class: row.get(2)?,
                    target_method: row.get(3)?,
                    // Replaced below once the stored verb is validated.
                    patch_type: PatchType::Prefix,
                    target_member_kind: row.get(5)?,
                    priority: row.get(6)?,
                    before: None,
                    after: None,
                    returns_bool: row.get(9)?,
                    modifies_result: row.get(10)?,
                    modifies_state: row.get(11)?,
                    is_guarded: row.get(12)?,
                    is_dynamic: row.get(13)?,
                    source_file: row.get(14)?,
                    line: row.get(15)?,
                };
                Ok((record, patch_type, before, after))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (mut record, patch_type, before, after) = row?;
                record.patch_type =
                    PatchType::parse(&patch_type).ok_or_else(|| invalid("patch_type", &patch_type))?;
                record.before = optional_set_from_json(before)?;
                record.after = optional_set_from_json(after)?;
                result.push(record);
            }
            result
        };

        let has_hierarchy: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM snapshot_meta WHERE key = ?1)",
            params![META_CLASS_HIERARCHY],
            |row| row.get(0),
        )?;
        let class_hierarchy = if has_hierarchy {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT class_name, parent_name FROM class_hierarchy ORDER BY class_name")?;
            let rows = stmt.query_map([], |row| {
                Ok(ClassEdge {
                    class: row.get(0)?,
                    parent: row.get(1)?,
                })
            })?;
            let edges: Vec<ClassEdge> = rows.collect::<Result<_, _>>()?;
            Some(ClassHierarchy::from_edges(edges))
        } else {
            None
        };

        Ok(Snapshot {
            definitions,
            properties,
            references,
            mods,
            operations,
            patches,
            class_hierarchy,
        })
    }

    fn get_definition(&self, id: DefId) -> Result<Definition, StorageError> {
        self.conn
            .query_row(
                "SELECT id, def_type, name, file, line, extends FROM definitions WHERE id = ?1",
                params![id.0],
                Self::definition_from_row,
            )
            .optional()?
            .ok_or(StorageError::DefinitionNotFound(id.0))
    }

    fn find_definition(
        &self,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Option<Definition>, StorageError> {
        let def = self
            .conn
            .query_row(
                "SELECT id, def_type, name, file, line, extends FROM definitions WHERE def_type = ?1 AND name = ?2 ORDER BY id LIMIT 1",
                params![kind.as_str(), name],
                Self::definition_from_row,
            )
            .optional()?;
        Ok(def)
    }

    fn list_mods(&self) -> Result<Vec<ModInfo>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, name FROM mods ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(ModInfo {
                id: ModId(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // -----------------------------------------------------------------------
    // Derived tables
    // -----------------------------------------------------------------------

    fn replace_graph(&mut self, tables: &GraphTables) -> Result<BuildRecord, StorageError> {
        let fingerprint = fingerprint_graph(tables)?.to_hex().to_string();

        // Dropping `tx` without commit rolls back, leaving the previous build.
        let tx = self.conn.transaction()?;
        for table in DERIVED_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO transitive_references (source_def_id, target_def_id, path_depth, reference_types_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for t in &tables.transitive {
                let labels_json = serde_json::to_string(&t.reference_types)?;
                stmt.execute(params![t.source_def_id.0, t.target_def_id.0, t.path_depth, labels_json])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO indirect_conflicts (shared_entity_def_id, pattern_id, pattern_name, severity, explanation, involved_mod_ids_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for c in &tables.indirect_conflicts {
                let mods_json = serde_json::to_string(&c.involved_mod_ids)?;
                stmt.execute(params![
                    c.shared_entity_def_id.0,
                    c.pattern_id,
                    c.pattern_name,
                    c.severity.as_str(),
                    c.explanation,
                    mods_json,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO patch_conflicts (kind, severity, target_class, target_method, related_class, mod_ids_json, patch_classes_json, explanation) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for c in &tables.patch_conflicts {
                let mods_json = serde_json::to_string(&c.mod_ids)?;
                let classes_json = serde_json::to_string(&c.patch_classes)?;
                stmt.execute(params![
                    c.kind.as_str(),
                    c.severity.as_str(),
                    c.target_class,
                    c.target_method,
                    c.related_class,
                    mods_json,
                    classes_json,
                    c.explanation,
                ])?;
            }
        }

        tx.execute(
            "INSERT INTO graph_builds (fingerprint, transitive_count, indirect_conflict_count, patch_conflict_count) VALUES (?1, ?2, ?3, ?4)",
            params![
                fingerprint,
                tables.transitive.len(),
                tables.indirect_conflicts.len(),
                tables.patch_conflicts.len(),
            ],
        )?;
        let build_id = tx.last_insert_rowid();

        tx.commit()?;

        Ok(BuildRecord {
            build_id,
            fingerprint,
            transitive_count: tables.transitive.len(),
            indirect_conflict_count: tables.indirect_conflicts.len(),
            patch_conflict_count: tables.patch_conflicts.len(),
        })
    }

    fn load_graph(&self) -> Result<GraphTables, StorageError> {
        let transitive = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT source_def_id, target_def_id, path_depth, reference_types_json FROM transitive_references ORDER BY source_def_id, target_def_id",
            )?;
            let rows = stmt.query_map([], Self::transitive_from_row)?;
            let mut result = Vec::new();
            for row in rows {
                result.push(Self::decode_transitive(row?)?);
            }
            result
        };

        let indirect_conflicts = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT shared_entity_def_id, pattern_id, pattern_name, severity, explanation, involved_mod_ids_json FROM indirect_conflicts ORDER BY id",
            )?;
            let rows = stmt.query_map([], Self::indirect_from_row)?;
            let mut result = Vec::new();
            for row in rows {
                result.push(Self::decode_indirect(row?)?);
            }
            result
        };

        let patch_conflicts = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT kind, severity, target_class, target_method, related_class, mod_ids_json, patch_classes_json, explanation FROM patch_conflicts ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (kind, severity, target_class, target_method, related_class, mods, classes, explanation) =
                    row?;
                result.push(PatchConflict {
                    kind: PatchConflictKind::parse(&kind).ok_or_else(|| invalid("kind", &kind))?,
                    severity: parse_severity(&severity)?,
                    target_class,
                    target_method,
                    related_class,
                    mod_ids: serde_json::from_str(&mods)?,
                    patch_classes: serde_json::from_str(&classes)?,
                    explanation,
                });
            }
            result
        };

        Ok(GraphTables {
            transitive,
            indirect_conflicts,
            patch_conflicts,
        })
    }

    fn transitive_to(&self, target: DefId) -> Result<Vec<TransitiveReference>, StorageError> {
        self.query_transitive(
            "SELECT source_def_id, target_def_id, path_depth, reference_types_json FROM transitive_references WHERE target_def_id = ?1 ORDER BY source_def_id",
            target,
        )
    }

    fn transitive_from(&self, source: DefId) -> Result<Vec<TransitiveReference>, StorageError> {
        self.query_transitive(
            "SELECT source_def_id, target_def_id, path_depth, reference_types_json FROM transitive_references WHERE source_def_id = ?1 ORDER BY target_def_id",
            source,
        )
    }

    fn conflicts_at(&self, def: DefId) -> Result<Vec<IndirectConflict>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT shared_entity_def_id, pattern_id, pattern_name, severity, explanation, involved_mod_ids_json FROM indirect_conflicts WHERE shared_entity_def_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![def.0], Self::indirect_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(Self::decode_indirect(row?)?);
        }
        Ok(result)
    }

    fn last_build(&self) -> Result<Option<BuildRecord>, StorageError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, fingerprint, transitive_count, indirect_conflict_count, patch_conflict_count FROM graph_builds ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(BuildRecord {
                        build_id: row.get(0)?,
                        fingerprint: row.get(1)?,
                        transitive_count: row.get(2)?,
                        indirect_conflict_count: row.get(3)?,
                        patch_conflict_count: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn counts(&self) -> Result<StoreCounts, StorageError> {
        Ok(StoreCounts {
            definitions: self.count("definitions")?,
            properties: self.count("properties")?,
            references: self.count("refs")?,
            mods: self.count("mods")?,
            operations: self.count("mod_operations")?,
            patches: self.count("patch_records")?,
            transitive: self.count("transitive_references")?,
            indirect_conflicts: self.count("indirect_conflicts")?,
            patch_conflicts: self.count("patch_conflicts")?,
        })
    }
}
