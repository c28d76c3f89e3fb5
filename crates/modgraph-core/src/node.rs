//! Definition and property records produced by the parsing stage.
//!
//! A [`Definition`] is a named, typed game-data entity. Its logical identity
//! is `(kind, name)`; `id` is the surrogate key the parser assigned. Both
//! records are immutable after a snapshot is imported.

use serde::{Deserialize, Serialize};

use crate::id::DefId;
use crate::types::EntityKind;

/// A named, typed game-data entity (item, block, buff, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub id: DefId,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    pub file: String,
    pub line: u32,
    /// Name of the parent definition. May dangle.
    #[serde(default)]
    pub extends: Option<String>,
}

impl Definition {
    /// Creates a definition with no source location and no parent.
    pub fn new(id: u64, kind: impl Into<EntityKind>, name: impl Into<String>) -> Self {
        Definition {
            id: DefId(id),
            kind: kind.into(),
            name: name.into(),
            file: String::new(),
            line: 0,
            extends: None,
        }
    }

    /// Sets the `extends` parent name.
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Human-readable `kind:name` label used in explanations and logs.
    pub fn label(&self) -> String {
        format!("{} '{}'", self.kind, self.name)
    }
}

/// A key/value pair owned by a definition.
///
/// `value` may itself name another definition; see
/// [`crate::pointer::pointer_kind`] for the fixed lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "definitionId", alias = "definition_id")]
    pub definition_id: DefId,
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub line: u32,
}

impl Property {
    /// Creates a property with a value and no class.
    pub fn new(definition_id: u64, name: impl Into<String>, value: impl Into<String>) -> Self {
        Property {
            definition_id: DefId(definition_id),
            name: name.into(),
            value: Some(value.into()),
            class: None,
            line: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_builder_sets_extends() {
        let def = Definition::new(1, "item", "woodFrame").extending("woodBlock");
        assert_eq!(def.kind, EntityKind::Item);
        assert_eq!(def.extends.as_deref(), Some("woodBlock"));
        assert_eq!(def.label(), "item 'woodFrame'");
    }

    #[test]
    fn definition_reads_parser_json() {
        let json = r#"{"id": 4, "type": "buff", "name": "buffBleeding",
                       "file": "buffs.xml", "line": 120}"#;
        let def: Definition = serde_json::from_str(json).unwrap();
        assert_eq!(def.id, DefId(4));
        assert_eq!(def.kind, EntityKind::Buff);
        assert!(def.extends.is_none());
    }

    #[test]
    fn property_accepts_both_key_spellings() {
        let a: Property =
            serde_json::from_str(r#"{"definitionId": 3, "name": "HandItem", "value": "meleeHandZombie"}"#)
                .unwrap();
        let b: Property =
            serde_json::from_str(r#"{"definition_id": 3, "name": "HandItem", "value": "meleeHandZombie"}"#)
                .unwrap();
        assert_eq!(a, b);
    }
}
