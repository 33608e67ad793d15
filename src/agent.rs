//! Per-step decision glue: observation in, one heading out.

use crate::config::Config;
use crate::field::RewardField;
use crate::geometry::Heading;
use crate::snapshot::{Observation, Snapshot, ThreatMemory};
use crate::solver::{self, SolveStats, TransitionModel};
use log::debug;

/// The policy agent.
///
/// Owns nothing but its configuration and the threat-direction memory;
/// the reward field and utility grid are rebuilt and re-converged from
/// scratch every decision step, trading per-step CPU for strict
/// correctness under a changing reward landscape.
pub struct PolicyAgent {
    config: Config,
    memory: ThreatMemory,
}

impl PolicyAgent {
    /// Create an agent, rejecting configurations that would break the
    /// value-iteration convergence guarantee
    pub fn new(config: Config) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            memory: ThreatMemory::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compute the best heading for the current step.
    ///
    /// Returns the chosen heading plus the solve statistics, or `None`
    /// for the heading when the environment offers no legal move (the
    /// harness decides what an empty action set means). The no-op
    /// heading is excluded from candidates before selection.
    pub fn decide(&mut self, observation: &Observation) -> (Option<Heading>, SolveStats) {
        let threats = self.memory.observe(&observation.threats);

        let snapshot = Snapshot {
            width: observation.width,
            height: observation.height,
            walls: observation.walls.clone(),
            goals: observation.goals.clone(),
            bonuses: observation.bonuses.clone(),
            threats,
            spawn_anchors: observation.spawn_anchors.clone(),
            agent: observation.agent,
        };

        let mut field = RewardField::build(&snapshot, &self.config);
        let model = TransitionModel::from_config(&self.config.solver);
        let stats = solver::value_iteration(&mut field, model, &self.config.solver);

        let candidates: Vec<Heading> = observation
            .legal
            .iter()
            .copied()
            .filter(|h| *h != Heading::Stop)
            .collect();

        let chosen =
            solver::best_action_among(&field, observation.agent, model, &candidates).map(|(h, _)| h);

        debug!(
            "step at {:?}: chose {:?} after {} sweeps (delta {:.4})",
            observation.agent, chosen, stats.sweeps, stats.final_delta
        );
        (chosen, stats)
    }

    /// Forget cross-step threat history (episode end)
    pub fn reset(&mut self) {
        self.memory.reset();
    }
}
