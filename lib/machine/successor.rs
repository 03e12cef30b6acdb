//! Injection of initial states and integration of actions into successors.

use crate::machine::control::Control;
use crate::machine::env::Environment;
use crate::machine::kont::{Kont, KontAddr};
use crate::machine::kstore::KontStore;
use crate::machine::semantics::{Action, ActionOf, KontAddrOf, KontStoreOf, Semantics, StateOf};
use crate::machine::state::State;
use crate::machine::store::Store;
use crate::machine::time::Time;
use crate::Error;

/// Build the initial state for a program: evaluate it in the initial
/// environment, under the `Halt` continuation, at the initial time.
pub fn inject<S: Semantics>(
    semantics: &S,
    program: S::Expr,
    seed: &str,
    collect_konts: bool,
) -> StateOf<S> {
    let env = Environment::new().bind_all(semantics.initial_env());
    let store = Store::new().extend_all(semantics.initial_store());
    let kstore = if collect_konts {
        KontStore::new()
    } else {
        KontStore::uncollected()
    };
    let kstore = kstore.add_ref(&KontAddr::Halt);
    State::new(
        Control::Eval(program, env),
        store,
        kstore,
        KontAddr::Halt,
        S::Time::initial(seed),
    )
}

/// Compute every successor of a state.
///
/// An `Eval` state steps the expression; a `Kont` state returns its value
/// through each continuation stored at the current address; halted states
/// have no successors.
pub fn step<S: Semantics>(semantics: &S, state: &StateOf<S>) -> Result<Vec<StateOf<S>>, Error> {
    match state.control() {
        Control::Eval(expr, env) => {
            let actions = semantics.step_eval(expr, env, state.store(), state.time())?;
            actions
                .into_iter()
                .map(|action| integrate::<S>(state, state.kont().clone(), action))
                .collect()
        }
        Control::Kont(value) => {
            if state.kont().is_halt() {
                return Ok(Vec::new());
            }
            let konts: Vec<_> = state.kstore().lookup(state.kont()).cloned().collect();
            if konts.is_empty() {
                return Err(Error::KontAddressMissing(format!("{:?}", state.kont())));
            }
            let mut successors = Vec::new();
            for kont in konts {
                let actions =
                    semantics.step_kont(value, kont.frame(), state.store(), state.time())?;
                for action in actions {
                    successors.push(integrate::<S>(state, kont.next().clone(), action)?);
                }
            }
            Ok(successors)
        }
        Control::Error(_) => Ok(Vec::new()),
    }
}

/// Turn one action into one successor state.
///
/// `base` is the continuation address the successor resumes from: the
/// current address when stepping an `Eval` state, the parent of the frame
/// being popped when stepping a `Kont` state. Whenever the root moves, the
/// new root is referenced before the old one is released, so no live
/// address ever transits through a zero count.
fn integrate<S: Semantics>(
    state: &StateOf<S>,
    base: KontAddrOf<S>,
    action: ActionOf<S>,
) -> Result<StateOf<S>, Error> {
    let old_root = state.kont();
    match action {
        Action::Value { value, store } => {
            let kstore = retarget::<S>(state, &base)?;
            Ok(State::new(
                Control::Kont(value),
                store,
                kstore,
                base,
                state.time().tick(),
            ))
        }
        Action::Eval { expr, env, store } => {
            let kstore = retarget::<S>(state, &base)?;
            Ok(State::new(
                Control::Eval(expr, env),
                store,
                kstore,
                base,
                state.time().tick(),
            ))
        }
        Action::StepIn {
            call_site,
            body,
            env,
            store,
            ..
        } => {
            let kstore = retarget::<S>(state, &base)?;
            Ok(State::new(
                Control::Eval(body, env),
                store,
                kstore,
                base,
                state.time().tick_call(&call_site),
            ))
        }
        Action::Push {
            frame,
            expr,
            env,
            store,
        } => {
            let next = KontAddr::normal(expr.clone(), state.time().clone());
            // Order matters: the extension takes the parent edge, the new
            // root is referenced, and only then is the old root released.
            let kstore = state.kstore().extend(&next, Kont::new(frame, base))?;
            let kstore = kstore.add_ref(&next);
            let kstore = kstore.dec_ref(old_root)?;
            Ok(State::new(
                Control::Eval(expr, env),
                store,
                kstore,
                next,
                state.time().tick(),
            ))
        }
        Action::Error { fault } => {
            let kstore = retarget::<S>(state, &base)?;
            Ok(State::new(
                Control::Error(fault),
                state.store().clone(),
                kstore,
                base,
                state.time().tick(),
            ))
        }
    }
}

/// Move the root reference from the state's address to `base`.
fn retarget<S: Semantics>(
    state: &StateOf<S>,
    base: &KontAddrOf<S>,
) -> Result<KontStoreOf<S>, Error> {
    if base == state.kont() {
        return Ok(state.kstore().clone());
    }
    let kstore = state.kstore().add_ref(base);
    kstore.dec_ref(state.kont())
}
