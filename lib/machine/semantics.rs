//! The interface between the machine and a language's abstract semantics.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

use crate::lattice::Lattice;
use crate::machine::control::Control;
use crate::machine::env::Environment;
use crate::machine::kont::{Kont, KontAddr};
use crate::machine::kstore::KontStore;
use crate::machine::state::State;
use crate::machine::store::Store;
use crate::machine::time::Time;
use crate::Error;

/// What a semantics asks the machine to do after stepping one control
/// point. Every variant that can change bindings carries the updated value
/// store.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Action<E, A: Ord, V, F, R> {
    /// The expression reduced to a value; return it to the continuation.
    Value { value: V, store: Store<A, V> },
    /// Push a frame awaiting `expr`, and evaluate `expr`.
    Push {
        frame: F,
        expr: E,
        env: Environment<A>,
        store: Store<A, V>,
    },
    /// Evaluate `expr` without touching the continuation.
    Eval {
        expr: E,
        env: Environment<A>,
        store: Store<A, V>,
    },
    /// Step into a function body. `operator` and `args` describe the call
    /// for diagnostics and analyses; the transition itself only uses the
    /// call site (for the clock), the body, the environment and the store.
    StepIn {
        call_site: E,
        operator: (E, Environment<A>),
        body: E,
        env: Environment<A>,
        store: Store<A, V>,
        args: Vec<(E, V)>,
    },
    /// The program is stuck on a semantic error.
    Error { fault: R },
}

/// An abstract semantics: everything the machine needs to know about a
/// language.
///
/// The machine supplies the plumbing (environments, stores, continuations,
/// the fixpoint); the semantics supplies the transition relation, split in
/// two the way a CESK machine is: `step_eval` for evaluating an expression
/// and `step_kont` for returning a value to a single continuation frame.
/// Both return a *set* of actions, as abstraction makes transitions
/// non-deterministic.
pub trait Semantics {
    type Expr: Clone + Debug + Eq + Ord + Hash;
    type Addr: Clone + Debug + Eq + Ord + Hash;
    type Value: Lattice;
    type Frame: Clone + Debug + Eq + Ord + Hash;
    type Fault: Clone + Debug + Eq + Hash;
    type Time: Time<Self::Expr>;

    /// Identifier bindings every program starts with.
    fn initial_env(&self) -> Vec<(String, Self::Addr)>;

    /// Store entries backing the initial bindings.
    fn initial_store(&self) -> Vec<(Self::Addr, Self::Value)>;

    /// Step an expression at a control point.
    fn step_eval(
        &self,
        expr: &Self::Expr,
        env: &EnvOf<Self>,
        store: &StoreOf<Self>,
        time: &Self::Time,
    ) -> Result<Vec<ActionOf<Self>>, Error>;

    /// Return a value to a continuation frame.
    fn step_kont(
        &self,
        value: &Self::Value,
        frame: &Self::Frame,
        store: &StoreOf<Self>,
        time: &Self::Time,
    ) -> Result<Vec<ActionOf<Self>>, Error>;
}

pub type EnvOf<S> = Environment<<S as Semantics>::Addr>;
pub type StoreOf<S> = Store<<S as Semantics>::Addr, <S as Semantics>::Value>;
pub type KontAddrOf<S> = KontAddr<<S as Semantics>::Expr, <S as Semantics>::Time>;
pub type KontOf<S> =
    Kont<<S as Semantics>::Frame, <S as Semantics>::Expr, <S as Semantics>::Time>;
pub type KontStoreOf<S> =
    KontStore<<S as Semantics>::Frame, <S as Semantics>::Expr, <S as Semantics>::Time>;
pub type ControlOf<S> = Control<
    <S as Semantics>::Expr,
    <S as Semantics>::Addr,
    <S as Semantics>::Value,
    <S as Semantics>::Fault,
>;
pub type StateOf<S> = State<
    <S as Semantics>::Expr,
    <S as Semantics>::Addr,
    <S as Semantics>::Value,
    <S as Semantics>::Frame,
    <S as Semantics>::Time,
    <S as Semantics>::Fault,
>;
pub type ActionOf<S> = Action<
    <S as Semantics>::Expr,
    <S as Semantics>::Addr,
    <S as Semantics>::Value,
    <S as Semantics>::Frame,
    <S as Semantics>::Fault,
>;
