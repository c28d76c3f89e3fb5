//! Build warnings with enough context to act on without re-running the build.
//!
//! [`BuildWarning`] covers every degradation a graph build tolerates. None of
//! them abort a pass; they are accumulated in the
//! [`BuildReport`](crate::build::BuildReport) and logged at `warn` level.

use serde::{Deserialize, Serialize};

/// A non-fatal issue found during a graph build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum BuildWarning {
    /// Raw references whose target name matched no definition.
    #[error("{count} reference(s) did not resolve to a definition")]
    UnresolvedReference {
        /// How many references were left out of the graph.
        count: usize,
        /// A few of the unresolved targets, as `kind:name`.
        samples: Vec<String>,
    },

    /// Raw references with no resolvable source definition.
    #[error("{count} reference(s) have no source definition")]
    MissingSource {
        count: usize,
    },

    /// Mod operations that named no resolvable entity and were skipped by
    /// pattern matching.
    #[error("{count} mod operation(s) target no known entity")]
    UnanchoredOperations {
        count: usize,
    },

    /// An optional input needed by one rule was absent; the rule was skipped.
    #[error("missing external input '{input}': {rule} skipped")]
    MissingExternalInput {
        /// The missing input.
        input: String,
        /// The rule that degraded to a no-op.
        rule: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_render_and_serialize_with_a_tag() {
        let warning = BuildWarning::MissingExternalInput {
            input: "class_hierarchy".into(),
            rule: "InheritanceOverlap".into(),
        };
        assert_eq!(
            warning.to_string(),
            "missing external input 'class_hierarchy': InheritanceOverlap skipped"
        );
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["warning"], "missing_external_input");
    }
}
