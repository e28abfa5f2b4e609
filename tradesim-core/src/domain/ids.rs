//! Identifier newtypes.
//!
//! Ids are allocated from per-run counters, never from clocks or random
//! sources, so that replaying a run yields identical ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the order manager on accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORD-{}", self.0)
    }
}

/// Identifier of one position slot; unique for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POS-{}", self.0)
    }
}

/// Monotonic id allocator.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_order_id(&mut self) -> OrderId {
        OrderId(self.bump())
    }

    pub fn next_position_id(&mut self) -> PositionId {
        PositionId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        if self.next == 0 {
            self.next = 1;
        }
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(OrderId(7).to_string(), "ORD-7");
        assert_eq!(PositionId(3).to_string(), "POS-3");
    }

    #[test]
    fn sequence_starts_at_one_and_increments() {
        let mut seq = IdSequence::new();
        assert_eq!(seq.next_order_id(), OrderId(1));
        assert_eq!(seq.next_order_id(), OrderId(2));

        let mut defaulted = IdSequence::default();
        assert_eq!(defaulted.next_position_id(), PositionId(1));
    }
}
