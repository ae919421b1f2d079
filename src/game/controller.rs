use crate::core::scheduler::{OneShotTimer, RepeatingTimer};
use crate::game::round::{
    self, HitOutcome, RoundRules, RoundState, RoundSummary, TickOutcome,
};
use log::{debug, info};
use rand::Rng;
use rand::rngs::ThreadRng;
use std::time::Instant;

/// State changes surfaced by one `poll` call, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    Activated(usize),
    Expired(usize),
    Ended,
}

/// Owns the round state and both timers. The embedding surface drives it
/// from one loop: `reset` on mount, `poll` every frame, `handle_hit` on
/// input, `cancel_timers` on teardown. Nothing else writes the state.
pub struct RoundController<R: Rng = ThreadRng> {
    rules: RoundRules,
    state: RoundState,
    activation: RepeatingTimer,
    expiry: OneShotTimer,
    /// Advanced on every activation and reset. An expiry firing with an
    /// older generation was armed for a round or target that no longer
    /// exists and must not act.
    generation: u64,
    rng: R,
}

impl RoundController {
    pub fn new(rules: RoundRules) -> Self {
        Self::with_rng(rules, rand::rng())
    }
}

impl<R: Rng> RoundController<R> {
    pub fn with_rng(rules: RoundRules, rng: R) -> Self {
        Self {
            rules,
            state: round::apply_reset(&rules),
            activation: RepeatingTimer::new(rules.activate_every),
            expiry: OneShotTimer::new(),
            generation: 0,
            rng,
        }
    }

    pub const fn state(&self) -> &RoundState {
        &self.state
    }

    pub const fn rules(&self) -> &RoundRules {
        &self.rules
    }

    /// Replaces the round wholesale and restarts the activation cadence.
    /// Any deadline armed before this call is both cancelled and stale.
    pub fn reset(&mut self, now: Instant) {
        self.generation = self.generation.wrapping_add(1);
        self.expiry.cancel();
        self.state = round::apply_reset(&self.rules);
        self.activation = RepeatingTimer::new(self.rules.activate_every);
        self.activation.start(now);
        info!(
            "round reset: {} cells, budget {}",
            self.rules.total_boxes, self.rules.max_hits
        );
    }

    /// Drops both timers without touching the state. Teardown path.
    pub fn cancel_timers(&mut self) {
        self.activation.cancel();
        self.expiry.cancel();
    }

    /// Fires every deadline that has elapsed by `now`, in due-time order,
    /// and reports the resulting state changes.
    pub fn poll(&mut self, now: Instant) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        loop {
            let exp_due = self.expiry.due_at().filter(|&t| t <= now);
            let act_due = self.activation.due_at().filter(|&t| t <= now);
            let expiry_first = match (exp_due, act_due) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(e), Some(a)) => e <= a,
            };
            if expiry_first {
                self.fire_expiry(now, &mut events);
            } else {
                self.fire_activation(now, &mut events);
            }
        }
        events
    }

    /// Scores the hit iff `cell_id` is the live cell and the round is not
    /// over; anything else is a silent no-op. A scored hit also disarms the
    /// pending expiry so it cannot fire against a later target.
    pub fn handle_hit(&mut self, cell_id: usize) -> HitOutcome {
        let outcome = round::apply_hit(&mut self.state, &self.rules, cell_id);
        if let HitOutcome::Scored(id) = outcome {
            self.expiry.cancel();
            debug!("cell {id} hit, score now {}", self.state.score);
        }
        outcome
    }

    /// Available once the round is over.
    pub fn summary(&self) -> Option<RoundSummary> {
        self.state
            .over
            .then(|| RoundSummary::from_state(&self.state, &self.rules))
    }

    fn fire_expiry(&mut self, now: Instant, events: &mut Vec<RoundEvent>) {
        let Some(generation) = self.expiry.fire_due(now) else {
            return;
        };
        if generation != self.generation {
            debug!("stale expiry (generation {generation}) ignored");
            return;
        }
        if let Some(id) = self.state.active_cell {
            round::apply_expiry(&mut self.state, id);
            debug!("cell {id} expired unhit");
            events.push(RoundEvent::Expired(id));
        }
    }

    fn fire_activation(&mut self, now: Instant, events: &mut Vec<RoundEvent>) {
        let Some(due) = self.activation.fire_due(now) else {
            return;
        };
        match round::apply_tick(&mut self.state, &self.rules, &mut self.rng) {
            TickOutcome::Activated(id) => {
                self.generation = self.generation.wrapping_add(1);
                self.expiry
                    .arm(due + self.rules.active_lifetime, self.generation);
                events.push(RoundEvent::Activated(id));
            }
            TickOutcome::Stalled => {
                debug!(
                    "tick with no unresolved cells, attempt {}/{}",
                    self.state.attempts, self.rules.max_hits
                );
            }
            TickOutcome::RoundOver => {
                self.activation.cancel();
                self.expiry.cancel();
                info!("round over, final score {}", self.state.score);
                events.push(RoundEvent::Ended);
            }
        }
    }
}
