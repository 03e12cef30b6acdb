//! Saker: An abstract interpretation engine for higher-order programs.
//!
//! Saker computes a finite over-approximation of the reachable state space of
//! a higher-order program by running a CESK-style abstract machine whose
//! components are allocated into finite abstract domains, following the
//! "Abstracting Abstract Machines" construction. A quick synopsis of Saker's
//! modules:
//!
//! * **graph** - A simple directed graph library, used for transition graphs.
//! * **lang** - A small Scheme-like surface language with an abstract
//!   semantics, usable as-is and as a reference for plugging in your own.
//! * **lattice** - The join-semilattice interface abstract values implement.
//! * **machine** - The abstract machine itself: stores, continuations,
//!   states, the action integrator, and the worklist fixpoint explorer.
//!
//! The machine is polymorphic over the value lattice, the address and
//! timestamp allocation policies, and the transition semantics. The
//! [`Semantics`](machine/semantics/trait.Semantics.html) trait ties these
//! together; [`explore`](machine/explorer/fn.explore.html) drives a program
//! to a fixed point and reports the halted states.
//!
//! ```
//! use saker::lang::{parse, SchemeSemantics};
//! use saker::machine::explorer::{explore, ExplorerOptions};
//! use saker::machine::time::ZeroCfa;
//!
//! # fn example() -> Result<(), saker::Error> {
//! let program = parse("((lambda (x) x) 42)")?;
//! let semantics = SchemeSemantics::<ZeroCfa>::new();
//! let exploration = explore(&semantics, program, &ExplorerOptions::default())?;
//! for value in exploration.final_values() {
//!     println!("{:?}", value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod lang;
pub mod lattice;
pub mod machine;

#[cfg(test)]
mod tests;

#[cfg(not(feature = "thread_safe"))]
use std::rc::Rc;
#[allow(clippy::upper_case_acronyms)]
#[cfg(not(feature = "thread_safe"))]
pub type RC<T> = Rc<T>;

#[cfg(feature = "thread_safe")]
use std::sync::Arc;
#[cfg(feature = "thread_safe")]
pub type RC<T> = Arc<T>;

pub use crate::error::Error;
