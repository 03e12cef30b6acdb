//! The abstract value store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::lattice::Lattice;
use crate::RC;

/// A map from address to abstract value, monotonic under `extend`.
///
/// The store is an immutable value: `extend` returns a new store, sharing
/// the underlying map with its ancestor until forced to copy. A binding is
/// only ever replaced by the join of the old and new values, so no entry
/// ever shrinks over the course of an exploration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Store<A: Ord, V> {
    map: RC<BTreeMap<A, V>>,
}

impl<A: Clone + Ord, V: Lattice> Store<A, V> {
    /// Create an empty store.
    pub fn new() -> Store<A, V> {
        Store {
            map: RC::new(BTreeMap::new()),
        }
    }

    /// Retrieve the value at `address`, or bottom if the address is absent.
    pub fn lookup(&self, address: &A) -> V {
        self.map
            .get(address)
            .cloned()
            .unwrap_or_else(V::bottom)
    }

    /// Retrieve a reference to the value at `address`, if present.
    pub fn get(&self, address: &A) -> Option<&V> {
        self.map.get(address)
    }

    /// Return a store where the entry at `address` is the join of `value`
    /// with whatever was there before. All other entries are unchanged.
    pub fn extend(&self, address: A, value: V) -> Store<A, V> {
        let mut store = self.clone();
        let map = RC::make_mut(&mut store.map);
        let joined = match map.get(&address) {
            Some(old) => old.join(&value),
            None => value,
        };
        map.insert(address, joined);
        store
    }

    /// Return a store with every binding of the iterator applied by join.
    pub fn extend_all<I: IntoIterator<Item = (A, V)>>(&self, bindings: I) -> Store<A, V> {
        let mut store = self.clone();
        let map = RC::make_mut(&mut store.map);
        for (address, value) in bindings {
            let joined = match map.get(&address) {
                Some(old) => old.join(&value),
                None => value,
            };
            map.insert(address, joined);
        }
        store
    }

    /// `self.subsumes(other)` holds iff every entry of `other` is subsumed
    /// by the entry at the same address here.
    pub fn subsumes(&self, other: &Store<A, V>) -> bool {
        if RC::ptr_eq(&self.map, &other.map) {
            return true;
        }
        other.map.iter().all(|(address, value)| match self.map.get(address) {
            Some(mine) => mine.subsumes(value),
            None => value.is_bottom(),
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&A, &V)> {
        self.map.iter()
    }
}

impl<A: Ord, V: PartialEq> PartialEq for Store<A, V> {
    fn eq(&self, other: &Self) -> bool {
        RC::ptr_eq(&self.map, &other.map) || self.map == other.map
    }
}

impl<A: Ord, V: Eq> Eq for Store<A, V> {}

impl<A: Ord + Hash, V: Hash> Hash for Store<A, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state);
    }
}
