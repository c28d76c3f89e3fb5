//! The fixed catalog of indirect conflict patterns.
//!
//! Patterns are listed in priority order. When several match the same anchor,
//! only the first is emitted.

use modgraph_core::Severity;

/// A named interaction pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pattern {
    /// A mod removes an entity that other definitions depend on.
    RemoveThenDepend,
    /// Distinct mods write the same property on descendants of one ancestor.
    WriteWriteSharedAncestor,
    /// One removal whose transitive fan-out exceeds the threshold.
    ChainAmplifiedCaution,
    /// Only additive operations touch the entity. Never emitted.
    CompatibleAdditive,
}

impl Pattern {
    /// Every pattern, highest priority first.
    pub const CATALOG: [Pattern; 4] = [
        Pattern::RemoveThenDepend,
        Pattern::WriteWriteSharedAncestor,
        Pattern::ChainAmplifiedCaution,
        Pattern::CompatibleAdditive,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Pattern::RemoveThenDepend => "remove-then-depend",
            Pattern::WriteWriteSharedAncestor => "write-write-shared-ancestor",
            Pattern::ChainAmplifiedCaution => "chain-amplified-caution",
            Pattern::CompatibleAdditive => "compatible-additive",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::RemoveThenDepend => "Remove-then-depend",
            Pattern::WriteWriteSharedAncestor => "Write-write on shared ancestor",
            Pattern::ChainAmplifiedCaution => "Chain-amplified caution",
            Pattern::CompatibleAdditive => "Compatible-additive",
        }
    }

    /// Severity of an emitted row; `None` for patterns that emit nothing.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Pattern::RemoveThenDepend => Some(Severity::High),
            Pattern::WriteWriteSharedAncestor | Pattern::ChainAmplifiedCaution => {
                Some(Severity::Medium)
            }
            Pattern::CompatibleAdditive => None,
        }
    }

    /// Position in [`Pattern::CATALOG`]; lower wins.
    pub fn priority(&self) -> usize {
        Pattern::CATALOG
            .iter()
            .position(|p| p == self)
            .unwrap_or(Pattern::CATALOG.len())
    }
}

/// Joins mod names as `A`, `A and B`, or `A, B and C`.
pub fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn verb<'a>(subjects: &[String], singular: &'a str, plural: &'a str) -> &'a str {
    if subjects.len() == 1 {
        singular
    } else {
        plural
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Remove-then-depend where other mods touch the entity or its dependents.
pub fn explain_remove_then_depend_shared(
    removers: &[String],
    entity: &str,
    others: &[String],
    dependents: usize,
) -> String {
    format!(
        "{} {} {entity}, but {} {} it or {} depending on it",
        join_names(removers),
        verb(removers, "removes", "remove"),
        join_names(others),
        verb(others, "modifies", "modify"),
        plural(dependents, "definition"),
    )
}

/// Remove-then-depend with no second mod involved.
pub fn explain_remove_then_depend_alone(
    removers: &[String],
    entity: &str,
    dependents: usize,
    nearest: &str,
) -> String {
    format!(
        "{} {} {entity}, a dependency of {} (nearest: {nearest})",
        join_names(removers),
        verb(removers, "removes", "remove"),
        plural(dependents, "definition"),
    )
}

/// Descendants named in a write-write explanation before the rest is
/// summarised as a count.
const LISTED_DESCENDANTS: usize = 5;

pub fn explain_write_write(
    mods: &[String],
    properties: &[&str],
    ancestor: &str,
    descendants: &[String],
) -> String {
    let listed = descendants[..descendants.len().min(LISTED_DESCENDANTS)].join(", ");
    let rest = descendants.len().saturating_sub(LISTED_DESCENDANTS);
    let descendants = if rest > 0 {
        format!("{listed} and {rest} more")
    } else {
        listed
    };
    format!(
        "{} all set '{}' on descendants of {ancestor} ({descendants})",
        join_names(mods),
        properties.join("', '"),
    )
}

pub fn explain_chain_amplified(
    removers: &[String],
    entity: &str,
    fan_out: usize,
    threshold: usize,
) -> String {
    format!(
        "{} {} {entity}, which reaches {} (threshold {threshold})",
        join_names(removers),
        verb(removers, "removes", "remove"),
        plural(fan_out, "definition"),
    )
}
