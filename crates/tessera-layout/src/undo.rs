#![forbid(unsafe_code)]

//! Bounded before-image undo stack.
//!
//! Unlike a redo-capable history, this stack only ever holds states that
//! existed *before* a destructive operation. `undo` pops the newest one and
//! the caller replaces its model with it wholesale.
//!
//! ```text
//! push(s0) push(s1) push(s2)        pop() -> s2
//! ┌──────────────────────┐          ┌──────────────────┐
//! │ [s0, s1, s2]         │   ───►   │ [s0, s1]         │
//! └──────────────────────┘          └──────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. `len() <= capacity()` after every operation; the oldest snapshot is
//!    evicted on overflow.
//! 2. A capacity of zero keeps nothing.
//! 3. Snapshots are owned deep copies; later model edits never reach them.

use std::collections::VecDeque;
use std::fmt;

/// Default number of snapshots retained.
pub const DEFAULT_UNDO_CAPACITY: usize = 10;

/// Bounded LIFO of model snapshots.
#[derive(Clone)]
pub struct UndoStack<T> {
    snapshots: VecDeque<T>,
    capacity: usize,
}

impl<T> fmt::Debug for UndoStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoStack")
            .field("depth", &self.snapshots.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> Default for UndoStack<T> {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl<T> UndoStack<T> {
    /// Create an empty stack holding at most `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Record a before-image, evicting the oldest snapshot when full.
    pub fn push(&mut self, snapshot: T) {
        if self.capacity == 0 {
            return;
        }
        while self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Take the most recent snapshot.
    pub fn pop(&mut self) -> Option<T> {
        self.snapshots.pop_back()
    }

    /// Peek at the most recent snapshot.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.snapshots.back()
    }

    /// Number of snapshots held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether there is nothing to undo.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Maximum number of snapshots retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_newest_first() {
        let mut stack = UndoStack::new(10);
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut stack = UndoStack::new(10);
        for i in 0..15 {
            stack.push(i);
            assert!(stack.len() <= 10);
        }
        assert_eq!(stack.len(), 10);
        assert_eq!(stack.peek(), Some(&14));
        let drained: Vec<_> = std::iter::from_fn(|| stack.pop()).collect();
        assert_eq!(drained, (5..15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut stack = UndoStack::new(0);
        stack.push("a");
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn snapshots_are_independent_copies() {
        let mut model = vec![1, 2, 3];
        let mut stack = UndoStack::default();
        stack.push(model.clone());
        model.push(4);
        assert_eq!(stack.pop(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn clear_empties_stack() {
        let mut stack = UndoStack::new(3);
        stack.push(1);
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.capacity(), 3);
    }

    #[test]
    fn debug_shows_depth_not_contents() {
        let mut stack = UndoStack::new(4);
        stack.push(vec![0u8; 1024]);
        let dbg = format!("{stack:?}");
        assert!(dbg.contains("depth: 1"));
        assert!(dbg.contains("capacity: 4"));
    }
}
