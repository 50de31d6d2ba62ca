//! Strong type definitions for chainlog.
//!
//! Identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a stream.
///
/// Ids are 1-based and increase in creation order, so ordering streams by
/// id is ordering them by creation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub i64);

impl StreamId {
    /// Create a new StreamId from a raw row id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Whether this id could have been assigned by a store.
    pub const fn is_assigned(&self) -> bool {
        self.0 >= 1
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StreamId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
