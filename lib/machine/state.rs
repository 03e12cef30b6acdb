//! Machine states.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

use crate::lattice::Lattice;
use crate::machine::control::Control;
use crate::machine::kont::KontAddr;
use crate::machine::kstore::KontStore;
use crate::machine::store::Store;

/// A machine state: control, value store, continuation store, current
/// continuation address, and timestamp.
///
/// States are immutable once constructed; a transition builds new states
/// from old ones. Two states are equal iff all five components are equal.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct State<E: Ord, A: Ord, V, F: Ord, T: Ord, R> {
    control: Control<E, A, V, R>,
    store: Store<A, V>,
    kstore: KontStore<F, E, T>,
    kont: KontAddr<E, T>,
    time: T,
}

impl<E, A, V, F, T, R> State<E, A, V, F, T, R>
where
    E: Clone + Debug + Eq + Ord + Hash,
    A: Clone + Debug + Eq + Ord + Hash,
    V: Lattice,
    F: Clone + Debug + Eq + Ord + Hash,
    T: Clone + Debug + Eq + Ord + Hash,
    R: Clone + Debug + Eq + Hash,
{
    pub fn new(
        control: Control<E, A, V, R>,
        store: Store<A, V>,
        kstore: KontStore<F, E, T>,
        kont: KontAddr<E, T>,
        time: T,
    ) -> State<E, A, V, F, T, R> {
        State {
            control,
            store,
            kstore,
            kont,
            time,
        }
    }

    pub fn control(&self) -> &Control<E, A, V, R> {
        &self.control
    }

    pub fn store(&self) -> &Store<A, V> {
        &self.store
    }

    pub fn kstore(&self) -> &KontStore<F, E, T> {
        &self.kstore
    }

    /// The current continuation address, the root the collector tracks.
    pub fn kont(&self) -> &KontAddr<E, T> {
        &self.kont
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    /// A bucketing key for worklists and visited sets: states sharing a
    /// continuation address are the candidates for subsumption checks.
    pub fn key(&self) -> &KontAddr<E, T> {
        &self.kont
    }

    /// A state is halted once it has returned a value to the root
    /// continuation, or reached a semantic error.
    pub fn is_halted(&self) -> bool {
        match self.control {
            Control::Kont(_) => self.kont.is_halt(),
            Control::Error(_) => true,
            Control::Eval(_, _) => false,
        }
    }

    /// `self.subsumes(other)` holds iff this state approximates `other`:
    /// same continuation address and time, component-wise subsumption on
    /// control and both stores.
    pub fn subsumes(&self, other: &State<E, A, V, F, T, R>) -> bool {
        self.kont == other.kont
            && self.time == other.time
            && self.control.subsumes(&other.control)
            && self.store.subsumes(&other.store)
            && self.kstore.subsumes(&other.kstore)
    }
}
