//! The control component of a machine state.

use serde::{Deserialize, Serialize};

use crate::lattice::Lattice;
use crate::machine::env::Environment;

/// Where a machine state sits in the evaluation of a program: evaluating an
/// expression, returning a value to its continuation, or stuck on a
/// semantic error.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Control<E, A: Ord, V, R> {
    Eval(E, Environment<A>),
    Kont(V),
    Error(R),
}

impl<E, A, V, R> Control<E, A, V, R>
where
    E: Eq,
    A: Clone + Eq + Ord,
    V: Lattice,
    R: Eq,
{
    /// `self.subsumes(other)` holds iff this control point approximates
    /// `other`: the same program point with a subsuming value, or an equal
    /// error.
    pub fn subsumes(&self, other: &Control<E, A, V, R>) -> bool {
        match (self, other) {
            (Control::Eval(expr, env), Control::Eval(other_expr, other_env)) => {
                expr == other_expr && env == other_env
            }
            (Control::Kont(value), Control::Kont(other_value)) => value.subsumes(other_value),
            (Control::Error(fault), Control::Error(other_fault)) => fault == other_fault,
            (_, _) => false,
        }
    }

    pub fn is_eval(&self) -> bool {
        matches!(self, Control::Eval(_, _))
    }

    pub fn is_kont(&self) -> bool {
        matches!(self, Control::Kont(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Control::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
    struct Chars(BTreeSet<char>);

    impl Lattice for Chars {
        fn bottom() -> Chars {
            Chars(BTreeSet::new())
        }
        fn join(&self, other: &Chars) -> Chars {
            Chars(self.0.union(&other.0).cloned().collect())
        }
        fn subsumes(&self, other: &Chars) -> bool {
            other.0.is_subset(&self.0)
        }
    }

    fn chars(values: &[char]) -> Chars {
        Chars(values.iter().cloned().collect())
    }

    type TestControl = Control<&'static str, u32, Chars, &'static str>;

    #[test]
    fn kont_subsumption_follows_the_lattice() {
        let small: TestControl = Control::Kont(chars(&['a']));
        let large: TestControl = Control::Kont(chars(&['a', 'b']));

        assert!(large.subsumes(&small));
        assert!(!small.subsumes(&large));
        assert!(small.subsumes(&small));
    }

    #[test]
    fn distinct_kinds_never_subsume() {
        let eval: TestControl = Control::Eval("e", Environment::new());
        let kont: TestControl = Control::Kont(chars(&['a']));
        let error: TestControl = Control::Error("bad");

        assert!(!eval.subsumes(&kont));
        assert!(!kont.subsumes(&error));
        assert!(!error.subsumes(&eval));
        assert!(error.subsumes(&error));
    }

    #[test]
    fn eval_subsumption_requires_identical_components() {
        let a: TestControl = Control::Eval("e", Environment::new().bind("x", 0));
        let b: TestControl = Control::Eval("e", Environment::new().bind("x", 1));
        assert!(a.subsumes(&a));
        assert!(!a.subsumes(&b));
    }
}
