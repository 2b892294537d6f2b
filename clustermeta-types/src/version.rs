//! Logical versions used to order updates to a replicated field.
//!
//! A version is a plain counter. Only the writer of a field advances it, so
//! it never needs wall-clock time: the next version is always derived from
//! the highest version the writer has already merged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version every freshly seeded field starts at.
    pub const ZERO: Self = Self(0);

    /// Creates a version from its raw counter.
    #[must_use]
    pub const fn new(counter: u64) -> Self {
        Self(counter)
    }

    /// Returns the raw counter.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the version that follows this one.
    ///
    /// Saturates at `u64::MAX`; a field would need 2^64 local edits to get
    /// there.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
