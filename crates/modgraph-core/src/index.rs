//! Point-lookup index over a definition snapshot.
//!
//! [`EntityIndex`] answers "which definition is `(kind, name)`" and "which
//! definition has id N" in O(1). It also implements the name resolution rule
//! every engine pass shares:
//!
//! 1. an exact `(kind, name)` match wins (duplicates resolve to the lowest id);
//! 2. otherwise, a name carried by exactly one definition of any kind
//!    resolves to it (extends edges are often emitted with the source's kind);
//! 3. otherwise the name is unresolved.

use std::collections::{HashMap, HashSet};

use crate::id::DefId;
use crate::node::Definition;
use crate::types::EntityKind;

/// Id and `(kind, name)` lookups over an immutable set of definitions.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    /// Definitions sorted by id.
    definitions: Vec<Definition>,
    by_id: HashMap<DefId, usize>,
    by_key: HashMap<EntityKind, HashMap<String, DefId>>,
    by_name: HashMap<String, Vec<DefId>>,
}

impl EntityIndex {
    pub fn new(mut definitions: Vec<Definition>) -> Self {
        definitions.sort_by_key(|d| d.id);
        definitions.dedup_by_key(|d| d.id);

        let mut by_id = HashMap::with_capacity(definitions.len());
        let mut by_key: HashMap<EntityKind, HashMap<String, DefId>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<DefId>> = HashMap::new();

        for (pos, def) in definitions.iter().enumerate() {
            by_id.insert(def.id, pos);
            // Sorted by id, so the first insert is the lowest id.
            by_key
                .entry(def.kind.clone())
                .or_default()
                .entry(def.name.clone())
                .or_insert(def.id);
            by_name.entry(def.name.clone()).or_default().push(def.id);
        }

        EntityIndex {
            definitions,
            by_id,
            by_key,
            by_name,
        }
    }

    /// All definitions, sorted by id.
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn contains(&self, id: DefId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: DefId) -> Option<&Definition> {
        self.by_id.get(&id).map(|&pos| &self.definitions[pos])
    }

    /// Exact `(kind, name)` lookup, no fallback.
    pub fn find(&self, kind: &EntityKind, name: &str) -> Option<&Definition> {
        let id = self.by_key.get(kind)?.get(name)?;
        self.get(*id)
    }

    /// Resolves a named target using the shared resolution rule.
    pub fn resolve(&self, kind: &EntityKind, name: &str) -> Option<DefId> {
        if let Some(id) = self.by_key.get(kind).and_then(|names| names.get(name)) {
            return Some(*id);
        }
        match self.by_name.get(name).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            _ => None,
        }
    }

    /// Resolves the `extends` parent of `id`, if it has one that exists.
    pub fn parent(&self, id: DefId) -> Option<DefId> {
        let def = self.get(id)?;
        let parent = def.extends.as_deref()?;
        self.resolve(&def.kind, parent).filter(|p| *p != id)
    }

    /// The `extends` ancestors of `id` with their depth (parent = 1),
    /// nearest first. Cyclic chains stop at the first repeat.
    pub fn ancestors(&self, id: DefId) -> Vec<(DefId, u32)> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;
        let mut depth = 0;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent) {
                break;
            }
            depth += 1;
            out.push((parent, depth));
            current = parent;
        }
        out
    }
}
