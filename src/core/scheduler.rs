use std::time::{Duration, Instant};

/// Cancellable repeating deadline for the activation tick.
///
/// Poll-driven: the frame loop asks `fire_due(now)` and the timer advances
/// its deadline by one period per firing, so a slow frame replays every
/// missed period in order instead of dropping them.
#[derive(Debug, Clone, Copy)]
pub struct RepeatingTimer {
    every: Duration,
    next_due: Option<Instant>,
}

impl RepeatingTimer {
    pub const fn new(every: Duration) -> Self {
        Self {
            every,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.every);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub const fn due_at(&self) -> Option<Instant> {
        self.next_due
    }

    /// Fires at most one period per call. Returns the deadline that was
    /// serviced so callers can schedule follow-up work relative to it.
    pub fn fire_due(&mut self, now: Instant) -> Option<Instant> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        self.next_due = Some(due + self.every);
        Some(due)
    }
}

/// Cancellable one-shot deadline for the active-cell expiry.
///
/// Each arming records the generation it belongs to; a firing whose
/// generation is no longer current has been superseded and must be ignored
/// by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneShotTimer {
    armed: Option<(Instant, u64)>,
}

impl OneShotTimer {
    pub const fn new() -> Self {
        Self { armed: None }
    }

    /// Arming overwrites any pending deadline.
    pub fn arm(&mut self, at: Instant, generation: u64) {
        self.armed = Some((at, generation));
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.armed.map(|(at, _)| at)
    }

    /// Disarms and returns the recorded generation when the deadline has
    /// passed.
    pub fn fire_due(&mut self, now: Instant) -> Option<u64> {
        let (at, generation) = self.armed?;
        if now < at {
            return None;
        }
        self.armed = None;
        Some(generation)
    }
}
