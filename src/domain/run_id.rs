//! Type-safe reconciliation run identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of one "reconcile all stores" run.
///
/// Wraps a UUID v4 generated when the run starts; it tags every log line
/// and the returned run summary so outcomes can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Creates a new random `RunId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for RunId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}
