//! Engine error types.
//!
//! Only failures a caller must handle are errors. Build-time degradations
//! (unresolved references, a missing class hierarchy) are
//! [`BuildWarning`](crate::diagnostics::BuildWarning) values collected in the
//! build report instead.

use thiserror::Error;

use modgraph_core::EntityKind;
use modgraph_storage::StorageError;

/// Errors produced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The queried entity is not in the definition table.
    ///
    /// Distinct from a known entity with no dependents, which is an empty
    /// result.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// A mod name passed to a compatibility check is unknown.
    #[error("mod '{name}' not found")]
    ModNotFound { name: String },

    /// The import bundle cannot be stored as given.
    #[error("invalid bundle: {reason}")]
    InvalidBundle { reason: String },

    /// The underlying store could not be opened, read or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::StoreUnavailable(err)
    }
}

impl EngineError {
    pub fn not_found(kind: &EntityKind, name: &str) -> Self {
        EngineError::NotFound {
            kind: kind.clone(),
            name: name.to_string(),
        }
    }
}
