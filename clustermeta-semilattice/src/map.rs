//! Keyed metadata maps.
//!
//! One deletable record per resource id. Join is key-wise: a key held by
//! only one side is copied over (as if the other side held an empty entry
//! at version zero), and shared keys join their entries.

use crate::{Deletable, Semilattice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A map from resource id to a deletable record.
///
/// The map owns every record; records never point back at the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Ord, V: Serialize",
    deserialize = "K: Deserialize<'de> + Ord, V: Deserialize<'de>"
))]
pub struct MetadataMap<K, V> {
    entries: BTreeMap<K, Deletable<V>>,
}

impl<K: Ord, V> Default for MetadataMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> MetadataMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Returns the live record for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(Deletable::get)
    }

    /// Returns the raw entry for `key`, tombstones included.
    #[must_use]
    pub fn entry(&self, key: &K) -> Option<&Deletable<V>> {
        self.entries.get(key)
    }

    /// Returns the raw entry for `key` mutably, tombstones included.
    pub fn entry_mut(&mut self, key: &K) -> Option<&mut Deletable<V>> {
        self.entries.get_mut(key)
    }

    /// Returns true if `key` has a live record.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over live records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(k, entry)| entry.get().map(|v| (k, v)))
    }

    /// Iterates over every entry in key order, tombstones included.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &Deletable<V>)> {
        self.entries.iter()
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> MetadataMap<K, V>
where
    K: Ord + Clone,
    V: Semilattice,
{
    /// Joins `entry` into the entry stored under `key`, inserting it if the
    /// key is new. Never moves an entry backwards.
    pub fn join_entry(&mut self, key: K, entry: Deletable<V>) {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => slot.get_mut().join(&entry),
        }
    }

    /// Builds a map holding exactly one entry. Handy for broadcasting a
    /// single-record delta.
    #[must_use]
    pub fn singleton(key: K, entry: Deletable<V>) -> Self {
        let mut map = Self::new();
        map.entries.insert(key, entry);
        map
    }
}

impl<K, V> Semilattice for MetadataMap<K, V>
where
    K: Ord + Clone,
    V: Semilattice,
{
    fn join(&mut self, other: &Self) {
        for (key, entry) in &other.entries {
            self.join_entry(key.clone(), entry.clone());
        }
    }
}

impl<K: Ord, V> FromIterator<(K, Deletable<V>)> for MetadataMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, Deletable<V>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
