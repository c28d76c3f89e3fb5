//! Core error types for modgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! the failure modes of the core data model.

use thiserror::Error;

use crate::id::DefId;

/// Core errors produced by the modgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A definition id was not found in the index.
    #[error("definition not found: DefId({id})", id = id.0)]
    DefinitionNotFound { id: DefId },

    /// A stored enum column held an unknown value.
    #[error("invalid {field} value: '{value}'")]
    InvalidValue { field: &'static str, value: String },
}
