//! Derived conflict rows emitted by the engine.
//!
//! [`IndirectConflict`] rows come from the XML-side pattern catalog and are
//! anchored at one shared entity. [`PatchConflict`] rows come from the
//! native-code patch rules and are keyed by target method.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{DefId, ModId};

/// Finding severity. Orders `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Severity> {
        match s {
            "Low" => Some(Severity::Low),
            "Medium" => Some(Severity::Medium),
            "High" => Some(Severity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-severity tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    /// The highest severity with a non-zero count.
    pub fn worst(&self) -> Option<Severity> {
        if self.high > 0 {
            Some(Severity::High)
        } else if self.medium > 0 {
            Some(Severity::Medium)
        } else if self.low > 0 {
            Some(Severity::Low)
        } else {
            None
        }
    }

    pub fn merge(&mut self, other: SeverityCounts) {
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }
}

impl FromIterator<Severity> for SeverityCounts {
    fn from_iter<I: IntoIterator<Item = Severity>>(iter: I) -> Self {
        let mut counts = SeverityCounts::default();
        for severity in iter {
            counts.record(severity);
        }
        counts
    }
}

/// A detected interaction pattern anchored at one shared entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectConflict {
    pub shared_entity_def_id: DefId,
    pub pattern_id: String,
    pub pattern_name: String,
    pub severity: Severity,
    pub explanation: String,
    pub involved_mod_ids: BTreeSet<ModId>,
}

/// Rule that produced a [`PatchConflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatchConflictKind {
    Collision,
    TranspilerConflict,
    SkipConflict,
    InheritanceOverlap,
    OrderConflict,
}

impl PatchConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchConflictKind::Collision => "Collision",
            PatchConflictKind::TranspilerConflict => "TranspilerConflict",
            PatchConflictKind::SkipConflict => "SkipConflict",
            PatchConflictKind::InheritanceOverlap => "InheritanceOverlap",
            PatchConflictKind::OrderConflict => "OrderConflict",
        }
    }

    pub fn parse(s: &str) -> Option<PatchConflictKind> {
        match s {
            "Collision" => Some(PatchConflictKind::Collision),
            "TranspilerConflict" => Some(PatchConflictKind::TranspilerConflict),
            "SkipConflict" => Some(PatchConflictKind::SkipConflict),
            "InheritanceOverlap" => Some(PatchConflictKind::InheritanceOverlap),
            "OrderConflict" => Some(PatchConflictKind::OrderConflict),
            _ => None,
        }
    }
}

impl fmt::Display for PatchConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collision between native-code patches of different mods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchConflict {
    pub kind: PatchConflictKind,
    pub severity: Severity,
    pub target_class: String,
    pub target_method: String,
    /// The derived class, for inheritance overlaps.
    #[serde(default)]
    pub related_class: Option<String>,
    pub mod_ids: BTreeSet<ModId>,
    pub patch_classes: Vec<String>,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(
            [Severity::Low, Severity::High, Severity::Medium].iter().max(),
            Some(&Severity::High)
        );
    }

    #[test]
    fn counts_report_worst_severity() {
        let counts: SeverityCounts = [Severity::Low, Severity::Medium].into_iter().collect();
        assert_eq!(counts.worst(), Some(Severity::Medium));
        assert_eq!(counts.total(), 2);
        assert_eq!(SeverityCounts::default().worst(), None);
    }

    #[test]
    fn patch_conflict_kind_parse_matches_as_str() {
        for kind in [
            PatchConflictKind::Collision,
            PatchConflictKind::TranspilerConflict,
            PatchConflictKind::SkipConflict,
            PatchConflictKind::InheritanceOverlap,
            PatchConflictKind::OrderConflict,
        ] {
            assert_eq!(PatchConflictKind::parse(kind.as_str()), Some(kind));
        }
    }
}
