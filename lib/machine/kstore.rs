//! The continuation store, with reference-counted reclamation.

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use crate::machine::kont::{Kont, KontAddr};
use crate::Error;

/// A map from continuation address to a set of continuations, augmented with
/// reference counts so unreachable entries are reclaimed as exploration
/// proceeds.
///
/// The count for an address is the number of distinct addresses whose
/// continuations name it as a parent, plus one if it is the current root of
/// the machine. The exploration moves a single root per transition, so the
/// whole collector reduces to an `add_ref`/`dec_ref` pair per step, with a
/// cascade when a count reaches zero. `incoming` holds the reverse edges:
/// it tells `extend` whether a parent edge is already counted, and is kept
/// consistent as entries are reclaimed.
///
/// Counts track reachability of continuation addresses inside a single
/// machine state; they have nothing to do with host memory management.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct KontStore<F: Ord, E: Ord, T: Ord> {
    konts: BTreeMap<KontAddr<E, T>, BTreeSet<Kont<F, E, T>>>,
    refs: BTreeMap<KontAddr<E, T>, usize>,
    incoming: BTreeMap<KontAddr<E, T>, BTreeSet<KontAddr<E, T>>>,
    collect: bool,
}

impl<F, E, T> KontStore<F, E, T>
where
    F: Clone + Debug + Eq + Ord,
    E: Clone + Debug + Eq + Ord,
    T: Clone + Debug + Eq + Ord,
{
    /// Create an empty, collecting store.
    pub fn new() -> KontStore<F, E, T> {
        KontStore {
            konts: BTreeMap::new(),
            refs: BTreeMap::new(),
            incoming: BTreeMap::new(),
            collect: true,
        }
    }

    /// Create an empty store that never reclaims entries.
    ///
    /// Counts are still maintained, but `dec_ref` stops at zero instead of
    /// removing the entry. Useful as a baseline to check the collector
    /// against.
    pub fn uncollected() -> KontStore<F, E, T> {
        KontStore {
            collect: false,
            ..KontStore::new()
        }
    }

    /// The continuations stored at `address`.
    pub fn lookup<'s>(
        &'s self,
        address: &KontAddr<E, T>,
    ) -> impl Iterator<Item = &'s Kont<F, E, T>> {
        self.konts.get(address).into_iter().flatten()
    }

    /// Add a continuation at `address`.
    ///
    /// Adding a continuation that is already present returns the store
    /// unchanged. Otherwise the parent named by the continuation gains a
    /// reference, unless an edge from `address` to that parent is already
    /// counted.
    ///
    /// # Errors
    /// Error if the parent is not allocated; continuations may only chain to
    /// live addresses.
    pub fn extend(
        &self,
        address: &KontAddr<E, T>,
        kont: Kont<F, E, T>,
    ) -> Result<KontStore<F, E, T>, Error> {
        if self
            .konts
            .get(address)
            .map_or(false, |konts| konts.contains(&kont))
        {
            return Ok(self.clone());
        }

        let parent = kont.next().clone();
        if !self.refs.contains_key(&parent) {
            return Err(Error::KontParentMissing(format!("{:?}", parent)));
        }

        let mut store = self.clone();
        store
            .konts
            .entry(address.clone())
            .or_default()
            .insert(kont);
        let fresh_edge = store
            .incoming
            .entry(parent.clone())
            .or_default()
            .insert(address.clone());
        if fresh_edge {
            *store.refs.entry(parent).or_insert(0) += 1;
        }
        Ok(store)
    }

    /// Add an external (root) reference to `address`, allocating it if
    /// absent.
    pub fn add_ref(&self, address: &KontAddr<E, T>) -> KontStore<F, E, T> {
        let mut store = self.clone();
        *store.refs.entry(address.clone()).or_insert(0) += 1;
        store
    }

    /// Drop a reference to `address`, reclaiming it (and cascading to its
    /// parents) if no references remain.
    ///
    /// # Errors
    /// Error if `address` has no references to drop; the exploration only
    /// ever releases references it has taken.
    pub fn dec_ref(&self, address: &KontAddr<E, T>) -> Result<KontStore<F, E, T>, Error> {
        let mut store = self.clone();
        store.release(address)?;
        Ok(store)
    }

    fn release(&mut self, address: &KontAddr<E, T>) -> Result<(), Error> {
        let count = self
            .refs
            .get_mut(address)
            .filter(|count| **count > 0)
            .ok_or_else(|| Error::RefCountUnderflow(format!("{:?}", address)))?;
        *count -= 1;
        if *count > 0 || !self.collect {
            return Ok(());
        }

        trace!("reclaiming continuation address {:?}", address);
        self.refs.remove(address);
        self.incoming.remove(address);
        let konts = self.konts.remove(address).unwrap_or_default();

        // An address with distinct continuations may share a parent; the
        // edge, and so the count, is per parent address.
        let parents: BTreeSet<KontAddr<E, T>> =
            konts.into_iter().map(|kont| kont.next().clone()).collect();
        for parent in parents {
            if let Some(children) = self.incoming.get_mut(&parent) {
                children.remove(address);
            }
            self.release(&parent)?;
        }
        Ok(())
    }

    /// `self.subsumes(other)` holds iff every continuation set of `other`
    /// is a subset of the set at the same address here.
    pub fn subsumes(&self, other: &KontStore<F, E, T>) -> bool {
        other
            .konts
            .iter()
            .all(|(address, konts)| match self.konts.get(address) {
                Some(mine) => konts.is_subset(mine),
                None => konts.is_empty(),
            })
    }

    /// The reference count for `address`; zero if unallocated.
    pub fn refs(&self, address: &KontAddr<E, T>) -> usize {
        self.refs.get(address).cloned().unwrap_or(0)
    }

    /// Return true if `address` is allocated.
    pub fn contains(&self, address: &KontAddr<E, T>) -> bool {
        self.refs.contains_key(address)
    }

    /// The number of addresses with stored continuations.
    pub fn len(&self) -> usize {
        self.konts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.konts.is_empty()
    }

    /// All addresses with stored continuations.
    pub fn addresses(&self) -> impl Iterator<Item = &KontAddr<E, T>> {
        self.konts.keys()
    }

    /// Check the collector's structural invariants: every stored address
    /// has a positive count, and every parent edge is mirrored in the
    /// reverse index.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        if self.collect {
            for address in self.konts.keys() {
                assert!(
                    self.refs.get(address).map_or(false, |count| *count >= 1),
                    "address {:?} stored without references",
                    address
                );
            }
        }
        for (address, konts) in &self.konts {
            for kont in konts {
                assert!(
                    self.incoming
                        .get(kont.next())
                        .map_or(false, |children| children.contains(address)),
                    "edge {:?} -> {:?} missing from reverse index",
                    address,
                    kont.next()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestStore = KontStore<&'static str, &'static str, u32>;
    type TestAddr = KontAddr<&'static str, u32>;

    fn halt() -> TestAddr {
        KontAddr::Halt
    }

    fn addr(expr: &'static str, time: u32) -> TestAddr {
        KontAddr::normal(expr, time)
    }

    /// A two-deep chain rooted at the tip: Halt <- k1 <- k2.
    fn chain() -> (TestStore, TestAddr, TestAddr) {
        let k1 = addr("e1", 0);
        let k2 = addr("e2", 1);

        let store = TestStore::new().add_ref(&halt());
        let store = store.extend(&k1, Kont::new("f1", halt())).unwrap();
        let store = store.add_ref(&k1);
        let store = store.dec_ref(&halt()).unwrap();
        let store = store.extend(&k2, Kont::new("f2", k1.clone())).unwrap();
        let store = store.add_ref(&k2);
        let store = store.dec_ref(&k1).unwrap();

        store.assert_invariants();
        (store, k1, k2)
    }

    /// The set of addresses a tracing pass reaches from the given roots.
    fn trace_reachable(store: &TestStore, roots: &[TestAddr]) -> BTreeSet<TestAddr> {
        let mut reached: BTreeSet<TestAddr> = BTreeSet::new();
        let mut queue: Vec<TestAddr> = roots.to_vec();
        while let Some(address) = queue.pop() {
            if !reached.insert(address.clone()) {
                continue;
            }
            for kont in store.lookup(&address) {
                queue.push(kont.next().clone());
            }
        }
        reached
    }

    #[test]
    fn extend_records_reverse_edge_and_count() {
        let (store, k1, k2) = chain();

        assert_eq!(store.refs(&halt()), 1);
        assert_eq!(store.refs(&k1), 1);
        assert_eq!(store.refs(&k2), 1);
        assert_eq!(store.lookup(&k2).count(), 1);
    }

    #[test]
    fn extend_is_idempotent() {
        let (store, _, k2) = chain();
        let again = store.extend(&k2, Kont::new("f2", addr("e1", 0))).unwrap();
        assert_eq!(store, again);
    }

    #[test]
    fn distinct_konts_share_one_edge_per_parent() {
        let k1 = addr("e1", 0);
        let store = TestStore::new().add_ref(&halt());
        let store = store.extend(&k1, Kont::new("f1", halt())).unwrap();
        let store = store.extend(&k1, Kont::new("f2", halt())).unwrap();

        // Two frames at k1, both chaining to Halt: one edge, one count.
        assert_eq!(store.lookup(&k1).count(), 2);
        assert_eq!(store.refs(&halt()), 2);
        store.assert_invariants();
    }

    #[test]
    fn extend_with_unallocated_parent_is_fatal() {
        let store = TestStore::new().add_ref(&halt());
        let orphan = addr("nope", 9);
        let result = store.extend(&addr("e", 0), Kont::new("f", orphan));
        assert!(matches!(result, Err(Error::KontParentMissing(_))));
    }

    #[test]
    fn dec_ref_underflow_is_fatal() {
        let store = TestStore::new().add_ref(&halt());
        let store = store.dec_ref(&halt()).unwrap();
        assert!(matches!(
            store.dec_ref(&halt()),
            Err(Error::RefCountUnderflow(_))
        ));
        assert!(matches!(
            TestStore::new().dec_ref(&addr("e", 0)),
            Err(Error::RefCountUnderflow(_))
        ));
    }

    #[test]
    fn cascade_reclaims_unreachable_chain() {
        let (store, k1, k2) = chain();

        // Return to Halt: the whole chain above it becomes garbage.
        let store = store.add_ref(&halt());
        let store = store.dec_ref(&k2).unwrap();

        assert!(!store.contains(&k1));
        assert!(!store.contains(&k2));
        assert_eq!(store.refs(&halt()), 1);
        assert!(store.is_empty());
        store.assert_invariants();
    }

    #[test]
    fn cascade_stops_at_shared_parent() {
        let k1 = addr("e1", 0);
        let k2a = addr("e2a", 1);
        let k2b = addr("e2b", 1);

        let store = TestStore::new().add_ref(&halt());
        let store = store.extend(&k1, Kont::new("f1", halt())).unwrap();
        let store = store.add_ref(&k1);
        let store = store.dec_ref(&halt()).unwrap();
        // Two branches hang off k1; only one is released.
        let store = store.extend(&k2a, Kont::new("fa", k1.clone())).unwrap();
        let store = store.add_ref(&k2a);
        let store = store.extend(&k2b, Kont::new("fb", k1.clone())).unwrap();
        let store = store.add_ref(&k2b);
        let store = store.dec_ref(&k1).unwrap();

        let store = store.dec_ref(&k2a).unwrap();

        assert!(!store.contains(&k2a));
        assert!(store.contains(&k2b));
        assert!(store.contains(&k1));
        assert_eq!(store.refs(&k1), 1);
        store.assert_invariants();
    }

    #[test]
    fn collection_matches_tracing_reachability() {
        let (store, _, k2) = chain();

        // Roots before the transition: the current root k2.
        assert_eq!(
            store.addresses().cloned().collect::<BTreeSet<_>>(),
            trace_reachable(&store, &[k2.clone()])
                .into_iter()
                .filter(|address| store.lookup(address).next().is_some())
                .collect::<BTreeSet<_>>()
        );

        // After returning to Halt, the store equals what tracing from the
        // new root retains.
        let store = store.add_ref(&halt());
        let store = store.dec_ref(&k2).unwrap();
        let reachable = trace_reachable(&store, &[halt()]);
        for address in store.addresses() {
            assert!(reachable.contains(address));
        }
    }

    #[test]
    fn uncollected_store_keeps_entries() {
        let k1 = addr("e1", 0);
        let store = TestStore::uncollected().add_ref(&halt());
        let store = store.extend(&k1, Kont::new("f1", halt())).unwrap();
        let store = store.add_ref(&k1);
        let store = store.dec_ref(&halt()).unwrap();

        let store = store.add_ref(&halt());
        let store = store.dec_ref(&k1).unwrap();

        assert!(store.contains(&k1));
        assert_eq!(store.refs(&k1), 0);
        assert_eq!(store.lookup(&k1).count(), 1);
    }

    #[test]
    fn subsumption_is_set_containment_per_address() {
        let k1 = addr("e1", 0);
        let small = TestStore::new().add_ref(&halt());
        let small = small.extend(&k1, Kont::new("f1", halt())).unwrap();
        let large = small.extend(&k1, Kont::new("f2", halt())).unwrap();

        assert!(large.subsumes(&small));
        assert!(!small.subsumes(&large));
        assert!(small.subsumes(&small.clone()));
    }
}
