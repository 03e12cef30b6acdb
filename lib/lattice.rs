//! The join-semilattice interface for abstract values.

use std::fmt::Debug;
use std::hash::Hash;

/// A join-semilattice of abstract values.
///
/// The machine only ever grows values: `join` combines two approximations
/// into one subsuming both, and `subsumes` is the induced partial order.
/// Implementations must satisfy the usual laws: `join` is associative,
/// commutative and idempotent; `a.join(b).subsumes(a)` always holds; and
/// `subsumes` is reflexive and transitive.
pub trait Lattice: Clone + Debug + Eq + Hash {
    /// The least element. Absent store entries read back as bottom.
    fn bottom() -> Self;

    /// Join this abstract value with another.
    fn join(&self, other: &Self) -> Self;

    /// `self.subsumes(other)` holds iff `other` carries no information this
    /// value does not already carry (`other ⊑ self`).
    fn subsumes(&self, other: &Self) -> bool;

    /// Return true if this value is the least element.
    fn is_bottom(&self) -> bool {
        *self == Self::bottom()
    }

    /// Join every value of an iterator, starting from bottom.
    fn join_all<'a, I>(values: I) -> Self
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        values
            .into_iter()
            .fold(Self::bottom(), |acc, value| acc.join(value))
    }
}
