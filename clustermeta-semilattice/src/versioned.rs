//! Versioned values.
//!
//! A single replicated field: a value plus the logical version it was
//! written at. Concurrent copies are resolved by comparing versions, the
//! higher one wins.
//!
//! Use cases:
//! - Server name and tag set
//! - Any table or database property with exactly one writer at a time

use crate::Semilattice;
use clustermeta_types::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// A value tagged with the logical version it was written at.
///
/// Only the writer of a field calls [`Versioned::update`]; every other
/// replica only ever joins. Two copies carrying the same version but
/// different values break that rule. Join still resolves them
/// deterministically (the larger JSON encoding wins) but logs a warning,
/// since that path exists only to keep replicas convergent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Versioned<T> {
    value: T,
    version: Version,
}

impl<T> Versioned<T> {
    /// Seeds a field at [`Version::ZERO`].
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value,
            version: Version::ZERO,
        }
    }

    /// Creates a field with an explicit version (for replay or testing).
    #[must_use]
    pub fn with_version(value: T, version: Version) -> Self {
        Self { value, version }
    }

    /// Returns a reference to the current value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the version of the current value.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Consumes the field, returning the value.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    /// Writes a new value and advances the version. Returns the new version.
    pub fn update(&mut self, value: T) -> Version {
        self.value = value;
        self.version = self.version.next();
        self.version
    }
}

impl<T: Serialize> Versioned<T> {
    /// Determines if `other` should replace `self` on join.
    fn loses_to(&self, other: &Self) -> bool
    where
        T: PartialEq,
    {
        match self.version.cmp(&other.version) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal if self.value == other.value => false,
            Ordering::Equal => {
                warn!(
                    version = %self.version,
                    "conflicting values written at the same version; using encoding tie-break"
                );
                encode(&other.value) > encode(&self.value)
            }
        }
    }
}

/// Last-resort tie-break key. Encoding the metadata types can't fail; a
/// failure degrades to the empty key.
fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|e| {
        warn!("failed to encode value for tie-break: {e}");
        Vec::new()
    })
}

impl<T> Semilattice for Versioned<T>
where
    T: Clone + PartialEq + Serialize,
{
    fn join(&mut self, other: &Self) {
        if self.loses_to(other) {
            self.value = other.value.clone();
            self.version = other.version;
        }
    }
}

impl<T: Default> Default for Versioned<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
