#![forbid(unsafe_code)]

//! Debounced, cancellable deferred task.
//!
//! A [`DeferredTask`] holds at most one pending deadline. Scheduling again
//! before it fires replaces the deadline (latest wins), so a burst of
//! mutations produces a single run once the burst has been quiet for
//! `delay`. The task does not own a timer: the host polls it with the
//! current time from a [`Clock`](tessera_core::Clock).
//!
//! ```text
//! schedule(t=0)   schedule(t=30)         poll(t=80) -> true
//!     │               │  deadline=80         │
//!     └──── superseded ┘─────────────────────┘
//! ```

use std::time::Duration;

/// Default quiet period before deferred compaction runs.
pub const DEFAULT_COMPACTION_DELAY: Duration = Duration::from_millis(50);

/// A single debounced deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTask {
    delay: Duration,
    deadline: Option<Duration>,
    /// Incremented on every schedule; lets callers tell runs apart.
    generation: u64,
}

impl Default for DeferredTask {
    fn default() -> Self {
        Self::new(DEFAULT_COMPACTION_DELAY)
    }
}

impl DeferredTask {
    /// Create an idle task that fires `delay` after the last schedule.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    /// Quiet period between the last schedule and the run.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule (or reschedule) the task relative to `now`.
    pub fn schedule(&mut self, now: Duration) {
        self.deadline = Some(now.saturating_add(self.delay));
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drop the pending run. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether a run is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Time left until the pending run, if any.
    #[must_use]
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_sub(now))
    }

    /// Number of times the task has been scheduled.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Consume the pending run if its deadline has passed.
    ///
    /// Returns `true` exactly once per settled burst.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Consume the pending run regardless of its deadline.
    pub fn take(&mut self) -> bool {
        self.cancel()
    }
}
