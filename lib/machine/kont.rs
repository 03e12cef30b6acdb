//! Continuation addresses and continuation frames.

use serde::{Deserialize, Serialize};

/// An abstract address for a continuation.
///
/// `Normal` addresses are allocated when a frame is pushed, keyed by the
/// expression awaiting the return value and the allocation timestamp. `Halt`
/// is the root continuation of every machine; a return to `Halt` is a halted
/// state.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum KontAddr<E, T> {
    Halt,
    Normal { expr: E, time: T },
}

impl<E, T> KontAddr<E, T> {
    pub fn normal(expr: E, time: T) -> KontAddr<E, T> {
        KontAddr::Normal { expr, time }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, KontAddr::Halt)
    }
}

/// A continuation: a frame paired with the address of the continuation to
/// resume once the frame has received its value.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Kont<F, E, T> {
    frame: F,
    next: KontAddr<E, T>,
}

impl<F, E, T> Kont<F, E, T> {
    pub fn new(frame: F, next: KontAddr<E, T>) -> Kont<F, E, T> {
        Kont { frame, next }
    }

    /// The frame awaiting a value.
    pub fn frame(&self) -> &F {
        &self.frame
    }

    /// The continuation to resume after this frame returns.
    pub fn next(&self) -> &KontAddr<E, T> {
        &self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_equality_is_structural() {
        let a: KontAddr<&'static str, u32> = KontAddr::normal("e", 0);
        let b = KontAddr::normal("e", 0);
        let c = KontAddr::normal("e", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, KontAddr::Halt);
        assert!(KontAddr::<&'static str, u32>::Halt.is_halt());
    }
}
