//! Native-code patch records and the decompiled class hierarchy.
//!
//! A [`PatchRecord`] describes one Harmony-style interception a mod installs
//! on a target method. `before`/`after` are soft ordering hints naming other
//! patch classes; nothing enforces them at load time.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ModId;

/// The four Harmony patch kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatchType {
    Prefix,
    Postfix,
    Transpiler,
    Finalizer,
}

impl PatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchType::Prefix => "Prefix",
            PatchType::Postfix => "Postfix",
            PatchType::Transpiler => "Transpiler",
            PatchType::Finalizer => "Finalizer",
        }
    }

    pub fn parse(s: &str) -> Option<PatchType> {
        match s {
            "Prefix" => Some(PatchType::Prefix),
            "Postfix" => Some(PatchType::Postfix),
            "Transpiler" => Some(PatchType::Transpiler),
            "Finalizer" => Some(PatchType::Finalizer),
            _ => None,
        }
    }
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harmony's default patch priority (`Priority.Normal`).
pub const DEFAULT_PRIORITY: i32 = 400;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// One native-code patch a mod installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRecord {
    pub mod_id: ModId,
    pub patch_class: String,
    pub target_class: String,
    pub target_method: String,
    pub patch_type: PatchType,
    #[serde(default)]
    pub target_member_kind: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub before: Option<BTreeSet<String>>,
    #[serde(default)]
    pub after: Option<BTreeSet<String>>,
    #[serde(default)]
    pub returns_bool: bool,
    #[serde(default)]
    pub modifies_result: bool,
    #[serde(default)]
    pub modifies_state: bool,
    #[serde(default)]
    pub is_guarded: bool,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub line: Option<u32>,
}

impl PatchRecord {
    /// Creates a patch with default priority and no flags set.
    pub fn new(
        mod_id: u64,
        patch_class: impl Into<String>,
        target_class: impl Into<String>,
        target_method: impl Into<String>,
        patch_type: PatchType,
    ) -> Self {
        PatchRecord {
            mod_id: ModId(mod_id),
            patch_class: patch_class.into(),
            target_class: target_class.into(),
            target_method: target_method.into(),
            patch_type,
            target_member_kind: None,
            priority: DEFAULT_PRIORITY,
            before: None,
            after: None,
            returns_bool: false,
            modifies_result: false,
            modifies_state: false,
            is_guarded: false,
            is_dynamic: false,
            source_file: String::new(),
            line: None,
        }
    }

    /// A prefix returning `bool` can skip the original method and every
    /// later prefix.
    pub fn short_circuits(&self) -> bool {
        self.patch_type == PatchType::Prefix && self.returns_bool
    }

    /// Writes to the return value without a guard around the write.
    pub fn unguarded_result_write(&self) -> bool {
        !self.is_guarded && self.modifies_result
    }

    /// Non-empty `before`/`after` hints, if any.
    pub fn has_ordering_hints(&self) -> bool {
        self.before.as_ref().is_some_and(|s| !s.is_empty())
            || self.after.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// `Class.Method` label of the patch target.
    pub fn target_label(&self) -> String {
        format!("{}.{}", self.target_class, self.target_method)
    }
}

/// One `class extends parent` line of the decompiled hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEdge {
    pub class: String,
    pub parent: String,
}

/// Decompiled class ancestry, keyed by class name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassHierarchy {
    parents: HashMap<String, String>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        ClassHierarchy::default()
    }

    /// Builds the hierarchy from `class -> parent` edges. A class listed
    /// twice keeps its last parent.
    pub fn from_edges(edges: impl IntoIterator<Item = ClassEdge>) -> Self {
        ClassHierarchy {
            parents: edges.into_iter().map(|e| (e.class, e.parent)).collect(),
        }
    }

    pub fn insert(&mut self, class: impl Into<String>, parent: impl Into<String>) {
        self.parents.insert(class.into(), parent.into());
    }

    pub fn parent(&self, class: &str) -> Option<&str> {
        self.parents.get(class).map(String::as_str)
    }

    /// Ancestors of `class`, nearest first. Stops at the first repeated
    /// class so malformed cyclic input terminates.
    pub fn ancestors(&self, class: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = class;
        while let Some(parent) = self.parent(current) {
            if parent == class || !seen.insert(parent) {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `class`.
    pub fn is_ancestor(&self, ancestor: &str, class: &str) -> bool {
        self.ancestors(class).contains(&ancestor)
    }

    /// All edges, sorted by class name.
    pub fn edges(&self) -> Vec<ClassEdge> {
        let mut edges: Vec<ClassEdge> = self
            .parents
            .iter()
            .map(|(class, parent)| ClassEdge {
                class: class.clone(),
                parent: parent.clone(),
            })
            .collect();
        edges.sort_by(|a, b| a.class.cmp(&b.class));
        edges
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> ClassHierarchy {
        let mut h = ClassHierarchy::new();
        h.insert("EntityZombie", "EntityEnemy");
        h.insert("EntityEnemy", "EntityAlive");
        h.insert("EntityAlive", "Entity");
        h
    }

    #[test]
    fn ancestors_are_nearest_first() {
        assert_eq!(
            hierarchy().ancestors("EntityZombie"),
            vec!["EntityEnemy", "EntityAlive", "Entity"]
        );
    }

    #[test]
    fn is_ancestor_is_strict() {
        let h = hierarchy();
        assert!(h.is_ancestor("EntityAlive", "EntityZombie"));
        assert!(!h.is_ancestor("EntityZombie", "EntityZombie"));
        assert!(!h.is_ancestor("EntityZombie", "EntityAlive"));
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let mut h = ClassHierarchy::new();
        h.insert("A", "B");
        h.insert("B", "C");
        h.insert("C", "A");
        assert_eq!(h.ancestors("A"), vec!["B", "C"]);
    }

    #[test]
    fn short_circuit_requires_bool_prefix() {
        let mut p = PatchRecord::new(1, "P", "C", "M", PatchType::Prefix);
        assert!(!p.short_circuits());
        p.returns_bool = true;
        assert!(p.short_circuits());
        p.patch_type = PatchType::Postfix;
        assert!(!p.short_circuits());
    }

    #[test]
    fn empty_hint_sets_are_not_hints() {
        let mut p = PatchRecord::new(1, "P", "C", "M", PatchType::Postfix);
        p.before = Some(BTreeSet::new());
        assert!(!p.has_ordering_hints());
        p.after = Some(BTreeSet::from(["Other".to_string()]));
        assert!(p.has_ordering_hints());
    }

    #[test]
    fn patch_json_defaults() {
        let json = r#"{"modId": 2, "patchClass": "BagPatch", "targetClass": "Bag",
                       "targetMethod": "GetSlots", "patchType": "Postfix"}"#;
        let p: PatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(p.priority, DEFAULT_PRIORITY);
        assert!(p.before.is_none());
        assert_eq!(p.target_label(), "Bag.GetSlots");
    }
}
