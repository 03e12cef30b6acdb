//! The abstract CESK machine: stores, continuations, states, the action
//! integrator, and the worklist fixpoint explorer.

pub mod control;
pub mod env;
pub mod explorer;
pub mod kont;
pub mod kstore;
pub mod semantics;
pub mod state;
pub mod store;
pub mod successor;
pub mod time;

pub use self::control::Control;
pub use self::env::Environment;
pub use self::explorer::{explore, Exploration, ExplorerOptions, WorkOrder};
pub use self::kont::{Kont, KontAddr};
pub use self::kstore::KontStore;
pub use self::semantics::{Action, Semantics};
pub use self::state::State;
pub use self::store::Store;
pub use self::successor::{inject, step};
pub use self::time::Time;
