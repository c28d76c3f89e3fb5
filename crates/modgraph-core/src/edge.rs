//! Edge records: raw references and their derived transitive closure.
//!
//! A raw [`Reference`] targets a definition *by name*. The target may not
//! exist; a dangling reference is meaningful data (usually an entity some
//! other mod adds later in load order), not a validation failure.
//!
//! [`TransitiveReference`] rows are owned by the engine and rebuilt wholesale
//! on every graph build.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::DefId;
use crate::types::EntityKind;

/// Edge label for `extends` edges.
pub const CONTEXT_EXTENDS: &str = "extends";
/// Edge label for recipe ingredient edges.
pub const CONTEXT_RECIPE_INGREDIENT: &str = "recipe_ingredient";
/// Edge label for loot table entries.
pub const CONTEXT_LOOT_ENTRY: &str = "loot_entry";
/// Edge label for entity group members.
pub const CONTEXT_GROUP_MEMBER: &str = "group_member";
/// Prefix of triggered-effect edge labels (`triggered_effect:<action>`).
pub const CONTEXT_TRIGGERED_EFFECT_PREFIX: &str = "triggered_effect:";
/// Prefix of property pointer edge labels (`property:<PropName>`).
pub const CONTEXT_PROPERTY_PREFIX: &str = "property:";

/// A raw, possibly dangling, named edge extracted during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub source_type: EntityKind,
    #[serde(default)]
    pub source_def_id: Option<DefId>,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub line: u32,
    pub target_type: EntityKind,
    pub target_name: String,
    /// Free-text edge label, e.g. `"extends"` or `"property:HandItem"`.
    pub context: String,
}

impl Reference {
    /// Creates a reference from a known source definition.
    pub fn new(
        source_type: impl Into<EntityKind>,
        source: u64,
        target_type: impl Into<EntityKind>,
        target_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Reference {
            source_type: source_type.into(),
            source_def_id: Some(DefId(source)),
            source_file: String::new(),
            line: 0,
            target_type: target_type.into(),
            target_name: target_name.into(),
            context: context.into(),
        }
    }

    /// Returns `true` if this is an `extends` edge.
    pub fn is_extends(&self) -> bool {
        self.context == CONTEXT_EXTENDS
    }
}

/// A derived reachability edge over resolved raw references.
///
/// Exists iff a directed path of resolvable raw edges of length `path_depth`
/// (the minimum such length) leads from `source_def_id` to `target_def_id`.
/// `reference_types` is the union of edge labels over every shortest path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveReference {
    pub source_def_id: DefId,
    pub target_def_id: DefId,
    pub path_depth: u32,
    pub reference_types: BTreeSet<String>,
}

impl TransitiveReference {
    /// The `(source, target)` primary key.
    pub fn key(&self) -> (DefId, DefId) {
        (self.source_def_id, self.target_def_id)
    }
}
