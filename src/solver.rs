//! Value-iteration policy solver.
//!
//! Solves the MDP defined by a [`RewardField`] under a stochastic
//! transition model: the intended heading succeeds with probability
//! `p_same`, and each perpendicular slip occurs with probability
//! `p_perp`. Sweeps are synchronous (Jacobi): every cell's new utility
//! is computed from the previous sweep's grid, then committed at once,
//! so results never depend on cell iteration order.

use crate::config::SolverConfig;
use crate::field::RewardField;
use crate::geometry::{Coordinate, Heading, CARDINALS};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Stochastic action outcome model.
///
/// The formalism assumes `p_same + 2*p_perp = 1`; configuration
/// validation enforces it before a model ever reaches the solver.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TransitionModel {
    pub p_same: f64,
    pub p_perp: f64,
}

impl TransitionModel {
    pub fn new(p_same: f64, p_perp: f64) -> Self {
        Self { p_same, p_perp }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.p_same, config.p_perp)
    }
}

/// Outcome of one value-iteration run
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SolveStats {
    /// Sweeps executed
    pub sweeps: u32,
    /// Max per-cell utility change of the last sweep
    pub final_delta: f64,
    /// Whether the run converged below epsilon before the sweep ceiling
    pub converged: bool,
}

/// Expected utility of intending to move along `heading` from `pos`.
///
/// Each outcome that would land in a wall resolves to staying at `pos`:
/// the actor's own utility substitutes for the blocked neighbor's.
pub fn expected_utility(
    field: &RewardField,
    pos: Coordinate,
    heading: Heading,
    model: TransitionModel,
) -> f64 {
    let own = field.utility_or(pos, 0.0);

    let mut utility = field.utility_or(pos.step(heading), own) * model.p_same;
    for perp in heading.perpendiculars() {
        utility += field.utility_or(pos.step(perp), own) * model.p_perp;
    }
    utility
}

/// Best heading among `candidates` by expected utility.
///
/// Candidates are considered in the fixed N, S, E, W order and only a
/// strictly greater utility displaces the incumbent, so ties resolve to
/// the earliest candidate deterministically. Returns `None` when no
/// candidate survives the filter (no legal action available).
pub fn best_action_among(
    field: &RewardField,
    pos: Coordinate,
    model: TransitionModel,
    candidates: &[Heading],
) -> Option<(Heading, f64)> {
    let mut best: Option<(Heading, f64)> = None;
    for heading in CARDINALS {
        if !candidates.contains(&heading) {
            continue;
        }
        let utility = expected_utility(field, pos, heading, model);
        if best.map_or(true, |(_, u)| utility > u) {
            best = Some((heading, utility));
        }
    }
    best
}

/// Best of all four cardinal headings (used inside sweeps, where every
/// heading is a candidate because walls resolve to staying in place)
pub fn best_action(
    field: &RewardField,
    pos: Coordinate,
    model: TransitionModel,
) -> (Heading, f64) {
    // CARDINALS is non-empty, so the unwrap cannot fire
    best_action_among(field, pos, model, &CARDINALS).expect("cardinal candidates are non-empty")
}

/// Run value iteration until the max per-cell utility change drops
/// below `config.epsilon`, or the sweep ceiling is hit.
///
/// The discount factor below 1 makes each sweep a contraction, so
/// convergence is guaranteed for validated configurations; the ceiling
/// is a safety valve, not part of the convergence argument.
pub fn value_iteration(
    field: &mut RewardField,
    model: TransitionModel,
    config: &SolverConfig,
) -> SolveStats {
    let mut stats = SolveStats::default();

    for sweep in 1..=config.max_sweeps {
        let delta = sweep_once(field, model, config.discount);
        stats.sweeps = sweep;
        stats.final_delta = delta;
        debug!("sweep {sweep}: max utility delta {delta:.6}");

        if delta < config.epsilon {
            stats.converged = true;
            break;
        }
    }

    if !stats.converged {
        warn!(
            "value iteration hit the {}-sweep ceiling without converging (delta {:.6})",
            config.max_sweeps, stats.final_delta
        );
    }
    stats
}

/// One synchronous sweep. All new utilities are computed from the
/// current grid in parallel by row, then committed sequentially; the
/// grid being read is never written mid-computation.
pub fn sweep_once(field: &mut RewardField, model: TransitionModel, discount: f64) -> f64 {
    let frozen: &RewardField = field;

    let updates: Vec<(Coordinate, f64)> = (0..frozen.height())
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..frozen.width()).filter_map(move |x| {
                let pos = Coordinate::new(x, y);
                let reward = frozen.reward(pos).value()?;
                let (_, best) = best_action(frozen, pos, model);
                Some((pos, reward + discount * best))
            })
        })
        .collect();

    let mut delta: f64 = 0.0;
    for (pos, value) in updates {
        let old = field.utility_or(pos, 0.0);
        delta = delta.max((value - old).abs());
        field.set_utility(pos, value);
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::snapshot::Snapshot;
    use std::collections::HashSet;

    fn open_snapshot(width: i32, height: i32) -> Snapshot {
        let mut walls = HashSet::new();
        for x in 0..width {
            walls.insert(Coordinate::new(x, 0));
            walls.insert(Coordinate::new(x, height - 1));
        }
        for y in 0..height {
            walls.insert(Coordinate::new(0, y));
            walls.insert(Coordinate::new(width - 1, y));
        }
        Snapshot {
            width,
            height,
            walls,
            goals: HashSet::new(),
            bonuses: HashSet::new(),
            threats: Vec::new(),
            spawn_anchors: Vec::new(),
            agent: Coordinate::new(1, 1),
        }
    }

    fn default_model() -> TransitionModel {
        TransitionModel::from_config(&Config::default().solver)
    }

    #[test]
    fn test_convergence_on_small_grid() {
        let mut snapshot = open_snapshot(7, 7);
        snapshot.goals.insert(Coordinate::new(5, 5));

        let config = Config::default();
        let mut field = RewardField::build(&snapshot, &config);
        let stats = value_iteration(&mut field, default_model(), &config.solver);

        assert!(stats.converged);
        assert!(stats.final_delta < config.solver.epsilon);
        assert!(stats.sweeps > 1);
    }

    #[test]
    fn test_idempotent_at_convergence() {
        let mut snapshot = open_snapshot(7, 7);
        snapshot.goals.insert(Coordinate::new(5, 5));

        let config = Config::default();
        let mut field = RewardField::build(&snapshot, &config);
        value_iteration(&mut field, default_model(), &config.solver);

        // One extra sweep after convergence moves nothing past epsilon
        let delta = sweep_once(&mut field, default_model(), config.solver.discount);
        assert!(delta < config.solver.epsilon);
    }

    #[test]
    fn test_walls_never_gain_utility() {
        let mut snapshot = open_snapshot(7, 7);
        snapshot.goals.insert(Coordinate::new(5, 5));
        snapshot.walls.insert(Coordinate::new(3, 3));

        let config = Config::default();
        let mut field = RewardField::build(&snapshot, &config);
        value_iteration(&mut field, default_model(), &config.solver);

        for pos in field.coords().collect::<Vec<_>>() {
            if snapshot.is_wall(pos) {
                assert!(field.utility(pos).is_blocked());
            }
        }
    }

    #[test]
    fn test_sweep_is_jacobi_not_gauss_seidel() {
        // A sweep must read only the pre-sweep grid: computing every
        // new value from a frozen copy and comparing catches any
        // in-place (order-dependent) update scheme.
        let mut snapshot = open_snapshot(6, 6);
        snapshot.goals.insert(Coordinate::new(4, 4));

        let config = Config::default();
        let model = default_model();
        let mut field = RewardField::build(&snapshot, &config);

        // Give the utilities some structure first
        sweep_once(&mut field, model, config.solver.discount);
        sweep_once(&mut field, model, config.solver.discount);

        let frozen = field.clone();
        sweep_once(&mut field, model, config.solver.discount);

        for pos in frozen.open_coords().collect::<Vec<_>>() {
            let reward = frozen.reward(pos).value().unwrap();
            let (_, best) = best_action(&frozen, pos, model);
            let expected = reward + config.solver.discount * best;
            let actual = field.utility(pos).value().unwrap();
            assert!(
                (actual - expected).abs() < 1e-12,
                "utility at {:?} was not computed from the pre-sweep grid",
                pos
            );
        }
    }

    #[test]
    fn test_tie_break_prefers_earliest_cardinal() {
        // Uniform utilities make every heading equal: North must win
        let snapshot = open_snapshot(7, 7);
        let config = Config::default();
        let field = RewardField::build(&snapshot, &config);

        let (heading, _) = best_action(&field, Coordinate::new(3, 3), default_model());
        assert_eq!(heading, Heading::North);
    }

    #[test]
    fn test_best_action_among_respects_candidates() {
        let snapshot = open_snapshot(7, 7);
        let config = Config::default();
        let field = RewardField::build(&snapshot, &config);
        let model = default_model();
        let pos = Coordinate::new(3, 3);

        let restricted = best_action_among(&field, pos, model, &[Heading::East, Heading::West]);
        assert_eq!(restricted.map(|(h, _)| h), Some(Heading::East));

        let none = best_action_among(&field, pos, model, &[]);
        assert!(none.is_none());
    }

    #[test]
    fn test_wall_outcome_resolves_to_staying() {
        // Agent in a corner: intending North into the wall must weight
        // the actor's own cell, not read the wall numerically
        let snapshot = open_snapshot(5, 5);
        let config = Config::default();
        let mut field = RewardField::build(&snapshot, &config);

        // Distinct utilities so the substitution is observable
        field.set_utility(Coordinate::new(1, 3), 10.0);
        field.set_utility(Coordinate::new(2, 3), 4.0);

        let model = default_model();
        // (1,3) has walls north and west
        let utility = expected_utility(&field, Coordinate::new(1, 3), Heading::North, model);
        let expected = 10.0 * model.p_same + 4.0 * model.p_perp + 10.0 * model.p_perp;
        assert!((utility - expected).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_empty_field_converges() {
        // No goals, no threats: uniform negative rewards still converge
        let config = Config::default();
        let snapshot = open_snapshot(6, 6);
        let mut field = RewardField::build(&snapshot, &config);
        let stats = value_iteration(&mut field, default_model(), &config.solver);
        assert!(stats.converged);
    }
}
