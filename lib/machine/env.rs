//! Environments map identifiers to abstract addresses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::RC;

/// A finite map from identifier to address.
///
/// Environments are immutable values. `bind` returns a new environment; the
/// underlying map is shared until a binding forces a copy.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Environment<A: Ord> {
    map: RC<BTreeMap<String, A>>,
}

impl<A: Clone + Ord> Environment<A> {
    /// Create an empty environment.
    pub fn new() -> Environment<A> {
        Environment {
            map: RC::new(BTreeMap::new()),
        }
    }

    /// Return a new environment where `name` maps to `address`, shadowing
    /// any previous binding for `name`.
    pub fn bind<N: Into<String>>(&self, name: N, address: A) -> Environment<A> {
        let mut env = self.clone();
        RC::make_mut(&mut env.map).insert(name.into(), address);
        env
    }

    /// Return a new environment with every binding of the iterator applied.
    pub fn bind_all<N, I>(&self, bindings: I) -> Environment<A>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, A)>,
    {
        let mut env = self.clone();
        let map = RC::make_mut(&mut env.map);
        for (name, address) in bindings {
            map.insert(name.into(), address);
        }
        env
    }

    /// Retrieve the address bound to `name`.
    pub fn lookup(&self, name: &str) -> Option<&A> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &A)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_shadows_and_shares() {
        let outer: Environment<usize> = Environment::new().bind("x", 0).bind("y", 1);
        let inner = outer.bind("x", 2);

        assert_eq!(outer.lookup("x"), Some(&0));
        assert_eq!(inner.lookup("x"), Some(&2));
        assert_eq!(inner.lookup("y"), Some(&1));
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn equality_is_structural() {
        let a: Environment<usize> = Environment::new().bind("x", 0);
        let b: Environment<usize> = Environment::new().bind("x", 0);
        assert_eq!(a, b);
        assert_ne!(a, b.bind("x", 1));
    }
}
