//! Single-shot re-poll timer.
//!
//! The engine owns exactly one of these. It is not a request deadline: the
//! multiplexer moves it around whenever its own retry deadline changes, and
//! the event loop fires it at most once per arming.

use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub(crate) struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self { deadline: None }
    }

    /// Arms the timer to fire once, `after` from now. A zero duration makes
    /// the timer due immediately.
    pub(crate) fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarms the timer and returns `true` if its deadline has been reached.
    pub(crate) fn fire_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left until the deadline, zero once it has passed.
    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
