//! Stable ID newtypes for store entities.
//!
//! All IDs are distinct newtype wrappers over `u64`, providing type safety
//! so that a `DefId` cannot be accidentally used where a `ModId` is expected.
//! Ids are assigned once by the parsing stage and never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Surrogate key of a [`Definition`](crate::node::Definition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefId(pub u64);

/// Identity of a mod package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModId(pub u64);

// Display implementations -- just print the inner value.

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
