//! Dependency graph and conflict engine for game mods.
//!
//! Builds the derived tables of an [`EntityStore`](modgraph_storage::EntityStore)
//! from its base snapshot and answers impact queries over them.
//!
//! # Architecture
//!
//! A build runs three sequential passes over an in-memory copy of the
//! snapshot, then commits all derived tables in one swap:
//! 1. the transitive reference builder (breadth-first closure per source);
//! 2. the indirect conflict detector (patterns over the closure);
//! 3. the patch conflict detector (rules over Harmony patch records).
//!
//! # Modules
//!
//! - [`ingest`]: import bundle, impact status at ingestion
//! - [`transitive`]: transitive reference builder
//! - [`indirect`]: indirect conflict patterns and arbitration
//! - [`patches`]: patch conflict rules
//! - [`build`]: full rebuild pipeline and build report
//! - [`query`]: dependents, dependencies, conflicts, chains, statistics
//! - [`compat`]: direct collisions and mod compatibility reports
//! - [`config`]: EngineConfig
//! - [`diagnostics`]: non-fatal build warnings
//! - [`error`]: EngineError

pub mod build;
pub mod compat;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod indirect;
pub mod ingest;
pub mod patches;
pub mod query;
pub mod transitive;

// Re-export key types for ergonomic use.
pub use build::{build_dependency_graph, BuildReport};
pub use compat::{check_compatibility, detect_direct_collisions, CompatReport, CompatSummary, DirectCollision, Finding};
pub use config::EngineConfig;
pub use diagnostics::BuildWarning;
pub use error::EngineError;
pub use indirect::{detect_indirect, IndirectOutcome, IndirectSummary, Pattern};
pub use ingest::{import_bundle, ingest, ImportBundle, IngestStats};
pub use patches::{detect_patch_conflicts, PatchOutcome, PatchSummary};
pub use query::{ChainHop, Direction, FanOutEntry, GraphStats, ImpactQuery, ImpactRow};
pub use transitive::{build_transitive, TransitiveBuilder, TransitiveOutcome, TransitiveStats};
