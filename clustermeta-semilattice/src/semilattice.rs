//! The join operation every replicated metadata type implements.

/// A join-semilattice.
///
/// `join` computes the least upper bound of two states and must be:
/// - Commutative: `a.joined(&b) == b.joined(&a)`
/// - Associative: `a.joined(&b).joined(&c) == a.joined(&b.joined(&c))`
/// - Idempotent: `a.joined(&a) == a`
///
/// Join is total: it never fails on well-formed input. Malformed wire data
/// is rejected by the decoder before it reaches a join.
pub trait Semilattice: Clone + PartialEq {
    /// Joins `other` into `self`.
    fn join(&mut self, other: &Self);

    /// Returns the join of `self` and `other`, leaving both untouched.
    #[must_use]
    fn joined(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.join(other);
        result
    }
}

/// Joins every state yielded by `states`, or returns `None` if there are
/// none.
pub fn join_all<'a, S, I>(states: I) -> Option<S>
where
    S: Semilattice + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut iter = states.into_iter();
    let mut acc = iter.next()?.clone();
    for state in iter {
        acc.join(state);
    }
    Some(acc)
}
