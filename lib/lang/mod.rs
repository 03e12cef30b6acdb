//! A small Scheme-like surface language with an abstract semantics.
//!
//! This is the machine's reference client: enough of a language to analyze
//! real higher-order programs, and a worked example of implementing the
//! [`Semantics`](../machine/semantics/trait.Semantics.html) interface.

pub mod ast;
pub mod semantics;
pub mod value;

pub use self::ast::{parse, Expr};
pub use self::semantics::{SchemeFault, SchemeFrame, SchemeSemantics};
pub use self::value::{IntSet, Prim, SchemeAddr, SchemeValue};
