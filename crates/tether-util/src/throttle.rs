//! Actuation throttling

use std::time::{Duration, Instant};

/// Minimum-gap gate between consecutive actions.
///
/// Used to keep refocus actuations from firing back-to-back when several
/// observers report the same foreground change.
#[derive(Debug)]
pub struct ActionThrottle {
    min_gap: Duration,
    last: Option<Instant>,
}

impl ActionThrottle {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: None,
        }
    }

    /// Try to pass the gate.
    ///
    /// Returns `true` (and records the attempt) if at least `min_gap` has
    /// elapsed since the last successful acquisition, `false` otherwise.
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.min_gap => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last acquisition, so the next attempt passes immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
