//! Abstract timestamps and the allocation policies built on them.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// An abstract timestamp, used to allocate fresh addresses.
///
/// The timestamp domain must be finite for any finite program, otherwise
/// exploration is not guaranteed to terminate. `tick` advances the clock on
/// an ordinary transition; `tick_call` additionally observes the call site
/// being stepped into, which is how context sensitivity enters the machine.
pub trait Time<E>: Clone + Debug + Eq + Ord + Hash {
    fn initial(seed: &str) -> Self;

    fn tick(&self) -> Self;

    fn tick_call(&self, call_site: &E) -> Self {
        let _ = call_site;
        self.tick()
    }
}

/// The context-insensitive clock: one timestamp per seed.
///
/// Every allocation at the same program point shares an address, giving the
/// classic 0-CFA analysis.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ZeroCfa {
    seed: String,
}

impl<E: Clone + Debug + Eq + Ord + Hash> Time<E> for ZeroCfa {
    fn initial(seed: &str) -> ZeroCfa {
        ZeroCfa {
            seed: seed.to_string(),
        }
    }

    fn tick(&self) -> ZeroCfa {
        self.clone()
    }
}

/// A last-k-call-sites clock: timestamps remember the `K` most recent call
/// sites, giving k-CFA context sensitivity. Finite because a finite program
/// has finitely many call sites.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct KCfa<E: Ord, const K: usize> {
    seed: String,
    call_sites: Vec<E>,
}

impl<E: Clone + Debug + Eq + Ord + Hash, const K: usize> Time<E> for KCfa<E, K> {
    fn initial(seed: &str) -> KCfa<E, K> {
        KCfa {
            seed: seed.to_string(),
            call_sites: Vec::new(),
        }
    }

    fn tick(&self) -> KCfa<E, K> {
        self.clone()
    }

    fn tick_call(&self, call_site: &E) -> KCfa<E, K> {
        let mut call_sites = vec![call_site.clone()];
        call_sites.extend(self.call_sites.iter().cloned());
        call_sites.truncate(K);
        KCfa {
            seed: self.seed.clone(),
            call_sites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cfa_never_advances() {
        let time: ZeroCfa = Time::<&'static str>::initial("seed");
        assert_eq!(Time::<&'static str>::tick(&time), time);
        assert_eq!(time.tick_call(&"call"), time);
    }

    #[test]
    fn k_cfa_remembers_the_last_k_call_sites() {
        let time: KCfa<&'static str, 2> = Time::initial("");
        let time = time.tick_call(&"a");
        let time = time.tick_call(&"b");
        let time = time.tick_call(&"c");

        assert_eq!(time.call_sites, vec!["c", "b"]);
        assert_eq!(time.tick(), time);
    }

    #[test]
    fn k_cfa_contexts_are_finite() {
        // Cycling through the same call sites revisits old timestamps.
        let initial: KCfa<&'static str, 1> = Time::initial("");
        let a = initial.tick_call(&"a");
        let again = a.tick_call(&"b").tick_call(&"a");
        assert_eq!(a, again);
    }
}
