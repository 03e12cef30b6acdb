//! The abstract value lattice for the Scheme-like language.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::lang::ast::Expr;
use crate::lattice::Lattice;
use crate::machine::env::Environment;
use crate::RC;

/// How many distinct integers a value tracks before collapsing to top.
pub const MAX_INT_CARDINALITY: usize = 1;

/// An abstract address for a value binding.
///
/// Variable addresses are keyed by name and allocation timestamp, which is
/// what makes the address space finite. `Prim` addresses back the initial
/// bindings; `Car`/`Cdr` addresses hold the fields of pairs built by
/// `cons`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SchemeAddr<T: Ord> {
    Var(String, T),
    Prim(String),
    Car(T),
    Cdr(T),
}

/// A builtin operation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Prim {
    Add,
    Sub,
    Mul,
    Lt,
    NumEq,
    Cons,
    Car,
    Cdr,
}

impl Prim {
    pub fn name(&self) -> &'static str {
        match self {
            Prim::Add => "+",
            Prim::Sub => "-",
            Prim::Mul => "*",
            Prim::Lt => "<",
            Prim::NumEq => "=",
            Prim::Cons => "cons",
            Prim::Car => "car",
            Prim::Cdr => "cdr",
        }
    }
}

/// A bounded set of integers: a set of at most [`MAX_INT_CARDINALITY`]
/// values, or top.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IntSet {
    Values(BTreeSet<i64>),
    Top,
}

impl IntSet {
    pub fn of(value: i64) -> IntSet {
        let mut values = BTreeSet::new();
        values.insert(value);
        IntSet::Values(values)
    }

    pub fn top() -> IntSet {
        IntSet::Top
    }

    pub fn bottom() -> IntSet {
        IntSet::Values(BTreeSet::new())
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, IntSet::Values(values) if values.is_empty())
    }

    fn collapse(values: BTreeSet<i64>) -> IntSet {
        if values.len() > MAX_INT_CARDINALITY {
            IntSet::Top
        } else {
            IntSet::Values(values)
        }
    }

    pub fn join(&self, other: &IntSet) -> IntSet {
        match (self, other) {
            (IntSet::Top, _) | (_, IntSet::Top) => IntSet::Top,
            (IntSet::Values(lhs), IntSet::Values(rhs)) => {
                IntSet::collapse(lhs.union(rhs).cloned().collect())
            }
        }
    }

    pub fn subsumes(&self, other: &IntSet) -> bool {
        match (self, other) {
            (IntSet::Top, _) => true,
            (IntSet::Values(_), IntSet::Top) => false,
            (IntSet::Values(lhs), IntSet::Values(rhs)) => rhs.is_subset(lhs),
        }
    }

    /// Apply a binary operation pointwise. Bottom is strict; top is
    /// contagious; a result with too many values collapses to top.
    pub fn binop<F: Fn(i64, i64) -> i64>(&self, other: &IntSet, op: F) -> IntSet {
        if self.is_bottom() || other.is_bottom() {
            return IntSet::bottom();
        }
        match (self, other) {
            (IntSet::Top, _) | (_, IntSet::Top) => IntSet::Top,
            (IntSet::Values(lhs), IntSet::Values(rhs)) => {
                let mut values = BTreeSet::new();
                for lhs in lhs {
                    for rhs in rhs {
                        values.insert(op(*lhs, *rhs));
                        if values.len() > MAX_INT_CARDINALITY {
                            return IntSet::Top;
                        }
                    }
                }
                IntSet::Values(values)
            }
        }
    }

    /// Apply a comparison pointwise, abstracting to the set of possible
    /// booleans.
    pub fn compare<F: Fn(i64, i64) -> bool>(&self, other: &IntSet, op: F) -> BTreeSet<bool> {
        if self.is_bottom() || other.is_bottom() {
            return BTreeSet::new();
        }
        match (self, other) {
            (IntSet::Top, _) | (_, IntSet::Top) => [false, true].iter().cloned().collect(),
            (IntSet::Values(lhs), IntSet::Values(rhs)) => {
                let mut booleans = BTreeSet::new();
                for lhs in lhs {
                    for rhs in rhs {
                        booleans.insert(op(*lhs, *rhs));
                    }
                }
                booleans
            }
        }
    }
}

/// An abstract Scheme value: one component per kind of runtime value,
/// joined componentwise.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SchemeValue<T: Ord> {
    bools: BTreeSet<bool>,
    ints: IntSet,
    nil: bool,
    closures: BTreeSet<(RC<Expr>, Environment<SchemeAddr<T>>)>,
    pairs: BTreeSet<(SchemeAddr<T>, SchemeAddr<T>)>,
    prims: BTreeSet<Prim>,
}

impl<T: Clone + Debug + Eq + Ord + Hash> SchemeValue<T> {
    pub fn bool(value: bool) -> SchemeValue<T> {
        let mut bools = BTreeSet::new();
        bools.insert(value);
        SchemeValue {
            bools,
            ..Self::bottom()
        }
    }

    pub fn bools<I: IntoIterator<Item = bool>>(values: I) -> SchemeValue<T> {
        SchemeValue {
            bools: values.into_iter().collect(),
            ..Self::bottom()
        }
    }

    pub fn int(value: i64) -> SchemeValue<T> {
        SchemeValue {
            ints: IntSet::of(value),
            ..Self::bottom()
        }
    }

    pub fn int_top() -> SchemeValue<T> {
        SchemeValue {
            ints: IntSet::top(),
            ..Self::bottom()
        }
    }

    pub fn ints(ints: IntSet) -> SchemeValue<T> {
        SchemeValue {
            ints,
            ..Self::bottom()
        }
    }

    pub fn nil() -> SchemeValue<T> {
        SchemeValue {
            nil: true,
            ..Self::bottom()
        }
    }

    pub fn closure(lambda: RC<Expr>, env: Environment<SchemeAddr<T>>) -> SchemeValue<T> {
        let mut closures = BTreeSet::new();
        closures.insert((lambda, env));
        SchemeValue {
            closures,
            ..Self::bottom()
        }
    }

    pub fn prim(prim: Prim) -> SchemeValue<T> {
        let mut prims = BTreeSet::new();
        prims.insert(prim);
        SchemeValue {
            prims,
            ..Self::bottom()
        }
    }

    pub fn pair(car: SchemeAddr<T>, cdr: SchemeAddr<T>) -> SchemeValue<T> {
        let mut pairs = BTreeSet::new();
        pairs.insert((car, cdr));
        SchemeValue {
            pairs,
            ..Self::bottom()
        }
    }

    pub fn int_set(&self) -> &IntSet {
        &self.ints
    }

    pub fn closures(
        &self,
    ) -> impl Iterator<Item = &(RC<Expr>, Environment<SchemeAddr<T>>)> {
        self.closures.iter()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &(SchemeAddr<T>, SchemeAddr<T>)> {
        self.pairs.iter()
    }

    pub fn prims(&self) -> impl Iterator<Item = &Prim> {
        self.prims.iter()
    }

    /// Could this value be anything but `#f`? Scheme treats everything
    /// except `#f` as true.
    pub fn may_be_truthy(&self) -> bool {
        self.bools.contains(&true)
            || !self.ints.is_bottom()
            || self.nil
            || !self.closures.is_empty()
            || !self.pairs.is_empty()
            || !self.prims.is_empty()
    }

    /// Could this value be `#f`?
    pub fn may_be_falsy(&self) -> bool {
        self.bools.contains(&false)
    }

    /// Does this value contain anything that cannot be applied?
    pub fn has_non_callable(&self) -> bool {
        !self.bools.is_empty() || !self.ints.is_bottom() || self.nil || !self.pairs.is_empty()
    }

    /// Does this value contain anything but integers?
    pub fn has_non_number(&self) -> bool {
        !self.bools.is_empty()
            || self.nil
            || !self.closures.is_empty()
            || !self.pairs.is_empty()
            || !self.prims.is_empty()
    }

    /// Does this value contain anything but pairs?
    pub fn has_non_pair(&self) -> bool {
        !self.bools.is_empty()
            || !self.ints.is_bottom()
            || self.nil
            || !self.closures.is_empty()
            || !self.prims.is_empty()
    }
}

impl<T: Clone + Debug + Eq + Ord + Hash> Lattice for SchemeValue<T> {
    fn bottom() -> SchemeValue<T> {
        SchemeValue {
            bools: BTreeSet::new(),
            ints: IntSet::bottom(),
            nil: false,
            closures: BTreeSet::new(),
            pairs: BTreeSet::new(),
            prims: BTreeSet::new(),
        }
    }

    fn join(&self, other: &SchemeValue<T>) -> SchemeValue<T> {
        SchemeValue {
            bools: self.bools.union(&other.bools).cloned().collect(),
            ints: self.ints.join(&other.ints),
            nil: self.nil || other.nil,
            closures: self.closures.union(&other.closures).cloned().collect(),
            pairs: self.pairs.union(&other.pairs).cloned().collect(),
            prims: self.prims.union(&other.prims).cloned().collect(),
        }
    }

    fn subsumes(&self, other: &SchemeValue<T>) -> bool {
        other.bools.is_subset(&self.bools)
            && self.ints.subsumes(&other.ints)
            && (self.nil || !other.nil)
            && other.closures.is_subset(&self.closures)
            && other.pairs.is_subset(&self.pairs)
            && other.prims.is_subset(&self.prims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::time::ZeroCfa;

    type Value = SchemeValue<ZeroCfa>;

    #[test]
    fn int_join_collapses_to_top() {
        let one = IntSet::of(1);
        let two = IntSet::of(2);

        assert_eq!(one.join(&one), one);
        assert_eq!(one.join(&two), IntSet::Top);
        assert_eq!(one.join(&IntSet::bottom()), one);
    }

    #[test]
    fn int_binop_is_strict_in_bottom_and_contagious_in_top() {
        let one = IntSet::of(1);

        assert!(one.binop(&IntSet::bottom(), |a, b| a + b).is_bottom());
        assert_eq!(one.binop(&IntSet::Top, |a, b| a + b), IntSet::Top);
        assert_eq!(one.binop(&IntSet::of(2), |a, b| a + b), IntSet::of(3));
    }

    #[test]
    fn int_compare_abstracts_over_top() {
        let one = IntSet::of(1);

        assert_eq!(
            one.compare(&IntSet::of(2), |a, b| a < b),
            [true].iter().cloned().collect()
        );
        assert_eq!(
            one.compare(&IntSet::Top, |a, b| a < b),
            [false, true].iter().cloned().collect()
        );
        assert!(one.compare(&IntSet::bottom(), |a, b| a < b).is_empty());
    }

    #[test]
    fn join_subsumes_both_operands() {
        let values = [
            Value::bottom(),
            Value::bool(true),
            Value::int(7),
            Value::int_top(),
            Value::nil(),
            Value::prim(Prim::Add),
        ];
        for lhs in &values {
            for rhs in &values {
                let joined = lhs.join(rhs);
                assert!(joined.subsumes(lhs));
                assert!(joined.subsumes(rhs));
            }
        }
    }

    #[test]
    fn subsumption_is_reflexive_and_transitive() {
        let values = [
            Value::bottom(),
            Value::bool(true),
            Value::bools([false, true]),
            Value::int(7),
            Value::int_top(),
            Value::int(7).join(&Value::nil()),
        ];
        for value in &values {
            assert!(value.subsumes(value));
        }
        for a in &values {
            for b in &values {
                for c in &values {
                    if a.subsumes(b) && b.subsumes(c) {
                        assert!(a.subsumes(c));
                    }
                }
            }
        }
    }

    #[test]
    fn truthiness() {
        assert!(Value::bool(true).may_be_truthy());
        assert!(!Value::bool(true).may_be_falsy());
        assert!(Value::bool(false).may_be_falsy());
        assert!(!Value::bool(false).may_be_truthy());
        assert!(Value::int(0).may_be_truthy());
        assert!(Value::nil().may_be_truthy());
        let both = Value::bools([false, true]);
        assert!(both.may_be_truthy() && both.may_be_falsy());
        assert!(!Value::bottom().may_be_truthy() && !Value::bottom().may_be_falsy());
    }
}
