//! Mod operation records: one row per mutation a mod applies to entity data.
//!
//! The operation verbs mirror the XPath patch vocabulary used by mod packages
//! (`set`, `append`, `remove`, `insertAfter`, ...). [`ImpactStatus`] is fixed
//! at ingestion time against the entity snapshot of that moment and is never
//! recomputed from the transitive graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ModId;
use crate::types::EntityKind;

/// A mod package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModInfo {
    pub id: ModId,
    pub name: String,
}

/// The verb of a mod operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Set,
    Append,
    Remove,
    #[serde(rename = "insertAfter", alias = "insertafter")]
    InsertAfter,
    #[serde(rename = "insertBefore", alias = "insertbefore")]
    InsertBefore,
    #[serde(rename = "setattribute", alias = "setAttribute")]
    SetAttribute,
    #[serde(rename = "removeattribute", alias = "removeAttribute")]
    RemoveAttribute,
    Csv,
}

impl OperationKind {
    /// All verbs, in declaration order.
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Set,
        OperationKind::Append,
        OperationKind::Remove,
        OperationKind::InsertAfter,
        OperationKind::InsertBefore,
        OperationKind::SetAttribute,
        OperationKind::RemoveAttribute,
        OperationKind::Csv,
    ];

    /// Returns the verb as it appears in mod patch files.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Set => "set",
            OperationKind::Append => "append",
            OperationKind::Remove => "remove",
            OperationKind::InsertAfter => "insertAfter",
            OperationKind::InsertBefore => "insertBefore",
            OperationKind::SetAttribute => "setattribute",
            OperationKind::RemoveAttribute => "removeattribute",
            OperationKind::Csv => "csv",
        }
    }

    /// Parses a verb, accepting the casing variants found in patch files.
    pub fn parse(s: &str) -> Option<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
    }

    /// Pure additions: append and the two insert verbs.
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            OperationKind::Append | OperationKind::InsertAfter | OperationKind::InsertBefore
        )
    }

    /// Removals of a node or an attribute.
    pub fn is_removal(&self) -> bool {
        matches!(self, OperationKind::Remove | OperationKind::RemoveAttribute)
    }

    /// Value writes that take over an existing property.
    pub fn is_write(&self) -> bool {
        matches!(self, OperationKind::Set | OperationKind::SetAttribute)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cheap ingestion-time impact estimate of a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactStatus {
    Safe,
    Caution,
    Conflict,
}

impl ImpactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactStatus::Safe => "Safe",
            ImpactStatus::Caution => "Caution",
            ImpactStatus::Conflict => "Conflict",
        }
    }

    pub fn parse(s: &str) -> Option<ImpactStatus> {
        match s {
            "Safe" => Some(ImpactStatus::Safe),
            "Caution" => Some(ImpactStatus::Caution),
            "Conflict" => Some(ImpactStatus::Conflict),
            _ => None,
        }
    }
}

/// One mutating operation a mod performs against entity data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModOperation {
    pub mod_id: ModId,
    pub operation: OperationKind,
    #[serde(default)]
    pub target_type: Option<EntityKind>,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    /// Raw XPath of the operation, when the scanner kept it.
    #[serde(default)]
    pub xpath: Option<String>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub line: u32,
    /// `None` until ingestion classifies the operation. A status supplied
    /// by the scanner is kept as is.
    #[serde(default)]
    pub impact_status: Option<ImpactStatus>,
}

impl ModOperation {
    /// Creates an operation against `(kind, name)` with no property.
    pub fn new(
        mod_id: u64,
        operation: OperationKind,
        target_type: impl Into<EntityKind>,
        target_name: impl Into<String>,
    ) -> Self {
        ModOperation {
            mod_id: ModId(mod_id),
            operation,
            target_type: Some(target_type.into()),
            target_name: Some(target_name.into()),
            property_name: None,
            new_value: None,
            xpath: None,
            file_path: String::new(),
            line: 0,
            impact_status: None,
        }
    }

    /// Sets the property the operation writes.
    pub fn on_property(mut self, name: impl Into<String>) -> Self {
        self.property_name = Some(name.into());
        self
    }

    /// Returns the `(kind, name)` target when both halves were extracted.
    pub fn target(&self) -> Option<(&EntityKind, &str)> {
        match (&self.target_type, &self.target_name) {
            (Some(kind), Some(name)) => Some((kind, name.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_case_insensitively() {
        assert_eq!(OperationKind::parse("insertafter"), Some(OperationKind::InsertAfter));
        assert_eq!(OperationKind::parse("setAttribute"), Some(OperationKind::SetAttribute));
        assert_eq!(OperationKind::parse("CSV"), Some(OperationKind::Csv));
        assert_eq!(OperationKind::parse("replace"), None);
    }

    #[test]
    fn verb_classes_are_disjoint() {
        for op in OperationKind::ALL {
            let classes = [op.is_additive(), op.is_removal(), op.is_write()];
            assert!(classes.iter().filter(|c| **c).count() <= 1, "{op}");
        }
        assert!(!OperationKind::Csv.is_additive());
        assert!(!OperationKind::Csv.is_write());
    }

    #[test]
    fn operation_reads_scanner_json() {
        let json = r#"{"modId": 3, "operation": "insertAfter", "targetType": "item",
                       "targetName": "gunPistol", "filePath": "Config/items.xml", "line": 8}"#;
        let op: ModOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.operation, OperationKind::InsertAfter);
        assert_eq!(op.impact_status, None);
        assert_eq!(op.target(), Some((&EntityKind::Item, "gunPistol")));
    }

    #[test]
    fn scanner_supplied_impact_status_is_read() {
        let json = r#"{"modId": 3, "operation": "remove", "targetType": "item",
                       "targetName": "gunPistol", "impactStatus": "Conflict"}"#;
        let op: ModOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.impact_status, Some(ImpactStatus::Conflict));
    }

    #[test]
    fn target_requires_both_halves() {
        let mut op = ModOperation::new(1, OperationKind::Set, "item", "x");
        op.target_type = None;
        assert!(op.target().is_none());
    }

    #[test]
    fn impact_status_parse_matches_as_str() {
        for status in [ImpactStatus::Safe, ImpactStatus::Caution, ImpactStatus::Conflict] {
            assert_eq!(ImpactStatus::parse(status.as_str()), Some(status));
        }
    }
}
