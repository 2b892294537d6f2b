//! Deletable entries (tombstones).
//!
//! Wraps a joinable value so that deletion is itself a fact that joins.
//! Each entry carries a lifecycle version that is bumped on creation,
//! deletion and re-creation. On join the higher lifecycle version wins
//! outright; at equal versions present values are joined and a tombstone
//! absorbs a present value.
//!
//! Tombstones are never dropped: a replica that forgot a deletion could
//! resurrect the stale pre-deletion state on its next join.

use crate::Semilattice;
use clustermeta_types::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A value that may have been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletable<T> {
    /// Lifecycle version of this entry.
    version: Version,
    /// The live value, or `None` for a tombstone.
    value: Option<T>,
}

impl<T> Deletable<T> {
    /// Creates a live entry at [`Version::ZERO`].
    #[must_use]
    pub fn present(value: T) -> Self {
        Self {
            version: Version::ZERO,
            value: Some(value),
        }
    }

    /// Creates a tombstone at the given lifecycle version.
    #[must_use]
    pub fn tombstone(version: Version) -> Self {
        Self {
            version,
            value: None,
        }
    }

    /// Creates an entry with an explicit lifecycle version (for replay or
    /// testing).
    #[must_use]
    pub fn with_version(value: Option<T>, version: Version) -> Self {
        Self { version, value }
    }

    /// Returns the live value, if any.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Returns a mutable reference to the live value, if any.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Returns true if this entry is a tombstone.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the lifecycle version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Marks the entry deleted, advancing the lifecycle version.
    pub fn delete(&mut self) -> Version {
        self.value = None;
        self.version = self.version.next();
        self.version
    }

    /// Brings the entry back with a new value, advancing the lifecycle
    /// version so the re-creation beats the tombstone everywhere.
    pub fn recreate(&mut self, value: T) -> Version {
        self.value = Some(value);
        self.version = self.version.next();
        self.version
    }
}

impl<T: Semilattice> Semilattice for Deletable<T> {
    fn join(&mut self, other: &Self) {
        match self.version.cmp(&other.version) {
            Ordering::Greater => {}
            Ordering::Less => *self = other.clone(),
            Ordering::Equal => match other.value.as_ref() {
                None => self.value = None,
                Some(theirs) => {
                    if let Some(mine) = self.value.as_mut() {
                        mine.join(theirs);
                    }
                }
            },
        }
    }
}
