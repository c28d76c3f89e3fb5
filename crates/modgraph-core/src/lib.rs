//! Data model of the modgraph engine.
//!
//! Definitions, properties and raw references come from the parsing stage;
//! mod operations and patch records come from the mod scanner. The engine
//! derives transitive references and conflict rows from them.

pub mod conflict;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod index;
pub mod node;
pub mod ops;
pub mod patch;
pub mod pointer;
pub mod types;

// Re-export commonly used types
pub use conflict::{IndirectConflict, PatchConflict, PatchConflictKind, Severity, SeverityCounts};
pub use edge::{Reference, TransitiveReference};
pub use error::CoreError;
pub use graph::{PathHop, ReferenceGraph, ResolutionStats};
pub use id::{DefId, ModId};
pub use index::EntityIndex;
pub use node::{Definition, Property};
pub use ops::{ImpactStatus, ModInfo, ModOperation, OperationKind};
pub use patch::{ClassEdge, ClassHierarchy, PatchRecord, PatchType};
pub use types::EntityKind;
