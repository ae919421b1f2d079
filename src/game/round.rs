use crate::config::Config;
use chrono::{DateTime, Utc};
use rand::{Rng, RngExt};
use std::time::Duration;

/// The constants one round is played under, resolved from config when the
/// controller is built so a mid-round config edit can't skew a live round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRules {
    pub total_boxes: usize,
    pub max_hits: u32,
    pub activate_every: Duration,
    pub active_lifetime: Duration,
    pub hit_reward: u32,
}

impl RoundRules {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            total_boxes: cfg.total_boxes,
            max_hits: cfg.max_hits,
            activate_every: Duration::from_millis(cfg.activate_every_ms),
            active_lifetime: Duration::from_millis(cfg.active_lifetime_ms),
            hit_reward: cfg.hit_reward,
        }
    }
}

/// One grid position. A cell with `hit = true` is retired for the rest of
/// the round and can never become active again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub id: usize,
    pub active: bool,
    pub hit: bool,
}

#[derive(Debug, Clone)]
pub struct RoundState {
    pub cells: Vec<Cell>,
    /// At most one cell is active at any instant; this mirrors its id.
    pub active_cell: Option<usize>,
    pub score: u32,
    /// Scheduler ticks consumed so far. Never exceeds the budget.
    pub attempts: u32,
    pub running: bool,
    pub over: bool,
}

impl RoundState {
    pub fn targets_hit(&self) -> u32 {
        self.cells.iter().filter(|c| c.hit).count() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new cell went live.
    Activated(usize),
    /// Attempt consumed but no unresolved cell was available to activate.
    Stalled,
    /// The budget is exhausted (or already was); terminal.
    RoundOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Scored(usize),
    Ignored,
}

/// Read-only snapshot handed to the round-end collaborators.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub score: u32,
    pub targets_hit: u32,
    pub max_hits: u32,
    pub total_boxes: usize,
    pub ended_at: DateTime<Utc>,
}

impl RoundSummary {
    pub fn from_state(state: &RoundState, rules: &RoundRules) -> Self {
        Self {
            score: state.score,
            targets_hit: state.targets_hit(),
            max_hits: rules.max_hits,
            total_boxes: rules.total_boxes,
            ended_at: Utc::now(),
        }
    }
}

fn clear_active(state: &mut RoundState) {
    if let Some(id) = state.active_cell.take() {
        state.cells[id].active = false;
    }
}

/// Builds the fresh state a round starts from. The previous state is fully
/// replaced; nothing carries over.
pub fn apply_reset(rules: &RoundRules) -> RoundState {
    RoundState {
        cells: (0..rules.total_boxes)
            .map(|id| Cell {
                id,
                active: false,
                hit: false,
            })
            .collect(),
        active_cell: None,
        score: 0,
        attempts: 0,
        running: true,
        over: false,
    }
}

/// One firing of the activation scheduler.
///
/// The boundary firing (the one that would push `attempts` past the budget)
/// performs the terminal transition and leaves `attempts` at the budget
/// value. Selection is uniform over the unresolved cells; an empty subset
/// consumes the attempt and changes nothing else, so a cleared board keeps
/// ticking until the budget runs out.
pub fn apply_tick<R: Rng>(state: &mut RoundState, rules: &RoundRules, rng: &mut R) -> TickOutcome {
    if state.over || !state.running {
        return TickOutcome::RoundOver;
    }

    let next = state.attempts + 1;
    if next > rules.max_hits {
        state.running = false;
        state.over = true;
        clear_active(state);
        return TickOutcome::RoundOver;
    }
    state.attempts = next;

    let candidates: Vec<usize> = state
        .cells
        .iter()
        .filter(|c| !c.hit)
        .map(|c| c.id)
        .collect();
    if candidates.is_empty() {
        return TickOutcome::Stalled;
    }

    clear_active(state);
    let id = candidates[rng.random_range(0..candidates.len())];
    state.cells[id].active = true;
    state.active_cell = Some(id);
    TickOutcome::Activated(id)
}

/// Reconciles a player hit against the current active cell. Anything other
/// than the live cell's id while the round is running is silently ignored;
/// an unknown id can never match and falls out the same way.
pub fn apply_hit(state: &mut RoundState, rules: &RoundRules, cell_id: usize) -> HitOutcome {
    if state.over || state.active_cell != Some(cell_id) {
        return HitOutcome::Ignored;
    }

    let cell = &mut state.cells[cell_id];
    cell.hit = true;
    cell.active = false;
    state.active_cell = None;
    state.score += rules.hit_reward;
    HitOutcome::Scored(cell_id)
}

/// Miss by timeout: the cell goes dark with no score change and stays
/// eligible for future activation. The cell must still be the live one —
/// a deferred firing that lost that race must not touch the state.
pub fn apply_expiry(state: &mut RoundState, cell_id: usize) {
    if state.over || state.active_cell != Some(cell_id) {
        return;
    }
    clear_active(state);
}

#[cfg(test)]
mod tests {
    use super::{
        Cell, HitOutcome, RoundRules, RoundState, TickOutcome, apply_expiry, apply_hit,
        apply_reset, apply_tick,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, RngExt, SeedableRng};
    use std::time::Duration;

    fn rules() -> RoundRules {
        RoundRules {
            total_boxes: 20,
            max_hits: 20,
            activate_every: Duration::from_millis(700),
            active_lifetime: Duration::from_millis(600),
            hit_reward: 10,
        }
    }

    fn active_count(state: &RoundState) -> usize {
        state.cells.iter().filter(|c| c.active).count()
    }

    #[test]
    fn reset_yields_fresh_round_regardless_of_prior_state() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = apply_reset(&rules);

        apply_tick(&mut state, &rules, &mut rng);
        let live = state.active_cell.expect("first tick should activate a cell");
        apply_hit(&mut state, &rules, live);
        assert!(state.score > 0);

        let state = apply_reset(&rules);
        assert_eq!(state.score, 0);
        assert_eq!(state.attempts, 0);
        assert!(state.running);
        assert!(!state.over);
        assert_eq!(state.active_cell, None);
        assert_eq!(state.cells.len(), rules.total_boxes);
        for (i, cell) in state.cells.iter().enumerate() {
            assert_eq!(
                *cell,
                Cell {
                    id: i,
                    active: false,
                    hit: false
                }
            );
        }
    }

    #[test]
    fn at_most_one_cell_is_active_across_arbitrary_interleavings() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(0xDECAF);
        let mut state = apply_reset(&rules);
        let mut op_rng = StdRng::seed_from_u64(99);

        for _ in 0..500 {
            match op_rng.random_range(0..4u8) {
                0 => {
                    apply_tick(&mut state, &rules, &mut rng);
                }
                1 => {
                    let id = op_rng.random_range(0..rules.total_boxes);
                    apply_hit(&mut state, &rules, id);
                }
                2 => {
                    let id = op_rng.random_range(0..rules.total_boxes);
                    apply_expiry(&mut state, id);
                }
                _ => {
                    if op_rng.random_range(0..10u8) == 0 {
                        state = apply_reset(&rules);
                    }
                }
            }

            assert!(active_count(&state) <= 1, "single-active invariant broken");
            assert_eq!(
                state.active_cell.is_some(),
                active_count(&state) == 1,
                "active pointer must mirror the cell flags"
            );
            assert!(state.attempts <= rules.max_hits);
            assert_eq!(state.score % rules.hit_reward, 0);
            if state.over {
                assert!(!state.running, "over implies not running");
            }
        }
    }

    #[test]
    fn hit_on_active_cell_scores_and_retires_it() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = apply_reset(&rules);

        let TickOutcome::Activated(id) = apply_tick(&mut state, &rules, &mut rng) else {
            panic!("first tick should activate a cell");
        };
        assert_eq!(apply_hit(&mut state, &rules, id), HitOutcome::Scored(id));
        assert_eq!(state.score, rules.hit_reward);
        assert!(state.cells[id].hit);
        assert!(!state.cells[id].active);
        assert_eq!(state.active_cell, None);
    }

    #[test]
    fn second_hit_on_same_cell_scores_at_most_once() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = apply_reset(&rules);

        let TickOutcome::Activated(id) = apply_tick(&mut state, &rules, &mut rng) else {
            panic!("first tick should activate a cell");
        };
        assert_eq!(apply_hit(&mut state, &rules, id), HitOutcome::Scored(id));
        assert_eq!(apply_hit(&mut state, &rules, id), HitOutcome::Ignored);
        assert_eq!(state.score, rules.hit_reward);
    }

    #[test]
    fn hits_on_inactive_or_unknown_cells_are_no_ops() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = apply_reset(&rules);

        assert_eq!(apply_hit(&mut state, &rules, 0), HitOutcome::Ignored);

        let TickOutcome::Activated(id) = apply_tick(&mut state, &rules, &mut rng) else {
            panic!("first tick should activate a cell");
        };
        let other = (id + 1) % rules.total_boxes;
        assert_eq!(apply_hit(&mut state, &rules, other), HitOutcome::Ignored);
        assert_eq!(
            apply_hit(&mut state, &rules, usize::MAX),
            HitOutcome::Ignored
        );
        assert_eq!(state.score, 0);
        assert_eq!(state.active_cell, Some(id));
    }

    #[test]
    fn retired_cell_is_excluded_from_later_selection() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = apply_reset(&rules);

        let TickOutcome::Activated(first) = apply_tick(&mut state, &rules, &mut rng) else {
            panic!("first tick should activate a cell");
        };
        apply_hit(&mut state, &rules, first);

        for _ in 0..(rules.max_hits - 1) {
            match apply_tick(&mut state, &rules, &mut rng) {
                TickOutcome::Activated(id) => {
                    assert_ne!(id, first, "a hit cell must never become active again");
                }
                other => panic!("expected an activation, got {other:?}"),
            }
        }
    }

    #[test]
    fn expiry_deactivates_without_scoring_and_keeps_cell_eligible() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = apply_reset(&rules);

        let TickOutcome::Activated(id) = apply_tick(&mut state, &rules, &mut rng) else {
            panic!("first tick should activate a cell");
        };
        apply_expiry(&mut state, id);

        assert_eq!(state.score, 0);
        assert_eq!(state.active_cell, None);
        assert!(!state.cells[id].active);
        assert!(!state.cells[id].hit, "a timed-out cell stays eligible");

        // A stale expiry for a cell that is no longer live must not touch
        // whatever is live now.
        let TickOutcome::Activated(second) = apply_tick(&mut state, &rules, &mut rng) else {
            panic!("second tick should activate a cell");
        };
        apply_expiry(&mut state, (second + 1) % rules.total_boxes);
        assert_eq!(state.active_cell, Some(second));
    }

    #[test]
    fn budget_exhaustion_is_terminal_and_freezes_score() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = apply_reset(&rules);

        for _ in 0..rules.max_hits {
            assert_ne!(
                apply_tick(&mut state, &rules, &mut rng),
                TickOutcome::RoundOver
            );
        }
        assert_eq!(state.attempts, rules.max_hits);
        assert!(!state.over);

        // The firing past the budget performs the terminal transition.
        assert_eq!(
            apply_tick(&mut state, &rules, &mut rng),
            TickOutcome::RoundOver
        );
        assert!(state.over);
        assert!(!state.running);
        assert_eq!(state.attempts, rules.max_hits);
        assert_eq!(state.active_cell, None);
        assert_eq!(active_count(&state), 0);

        let frozen = state.score;
        for id in 0..rules.total_boxes {
            assert_eq!(apply_hit(&mut state, &rules, id), HitOutcome::Ignored);
        }
        assert_eq!(
            apply_tick(&mut state, &rules, &mut rng),
            TickOutcome::RoundOver
        );
        assert_eq!(state.score, frozen);
        assert_eq!(state.attempts, rules.max_hits);
    }

    #[test]
    fn cleared_board_stalls_until_budget_runs_out() {
        let rules = RoundRules {
            total_boxes: 2,
            max_hits: 10,
            ..rules()
        };
        let mut rng = StdRng::seed_from_u64(13);
        let mut state = apply_reset(&rules);

        // Clear both cells.
        while state.targets_hit() < 2 {
            if let TickOutcome::Activated(id) = apply_tick(&mut state, &rules, &mut rng) {
                apply_hit(&mut state, &rules, id);
            }
            assert!(!state.over, "budget should outlast two cells here");
        }

        // Every remaining attempt stalls; the round still ends by budget.
        loop {
            match apply_tick(&mut state, &rules, &mut rng) {
                TickOutcome::Stalled => assert_eq!(state.active_cell, None),
                TickOutcome::RoundOver => break,
                TickOutcome::Activated(id) => panic!("activated retired cell {id}"),
            }
        }
        assert!(state.over);
        assert_eq!(state.attempts, rules.max_hits);
        assert_eq!(state.score, 2 * rules.hit_reward);
    }
}
