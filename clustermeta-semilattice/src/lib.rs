//! Semilattice join engine for clustermeta.
//!
//! This crate provides the building blocks of replicated cluster metadata:
//!
//! - [`Semilattice`]: the join operation itself
//! - [`Versioned<T>`]: a single field plus the logical version it was written at
//! - [`Deletable<T>`]: tombstone wrapper so deletion is a joinable fact
//! - [`MetadataMap<K, V>`]: one deletable record per resource id
//!
//! Records built from these pieces join field by field, so concurrent
//! edits to different fields never clobber each other. Every type here
//! satisfies:
//! - **Commutative**: join(a, b) == join(b, a)
//! - **Associative**: join(join(a, b), c) == join(a, join(b, c))
//! - **Idempotent**: join(a, a) == a
//!
//! These properties ensure that replicas converge to the same state no
//! matter how often, or in which order, updates are delivered.

mod deletable;
mod map;
mod semilattice;
mod versioned;

pub use deletable::Deletable;
pub use map::MetadataMap;
pub use semilattice::{Semilattice, join_all};
pub use versioned::Versioned;
