//! Statistics tracking for episodes.

use serde::{Deserialize, Serialize};

/// How an episode ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Every goal collected
    Won,
    /// Captured by a dangerous threat
    Lost,
    /// Step cap reached first
    StepLimit,
    /// The environment offered no legal move
    Stuck,
}

/// Statistics accumulated over one episode
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Steps taken so far
    pub steps: u64,
    /// Goals collected
    pub goals_eaten: usize,
    /// Bonuses collected
    pub bonuses_eaten: usize,
    /// Harmless threats eaten
    pub threats_eaten: usize,
    /// Goals left on the board
    pub goals_remaining: usize,
    /// Value-iteration sweeps summed across all decision steps
    pub sweeps_total: u64,
    /// Largest sweep count any single decision needed
    pub sweeps_max: u32,
    /// Set once the episode terminates
    pub outcome: Option<Outcome>,
}

impl EpisodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decision's solve cost into the running totals
    pub fn record_solve(&mut self, sweeps: u32) {
        self.sweeps_total += sweeps as u64;
        self.sweeps_max = self.sweeps_max.max(sweeps);
    }

    /// Mean sweeps per decision step
    pub fn sweeps_mean(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.sweeps_total as f64 / self.steps as f64
        }
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        let outcome = match self.outcome {
            Some(Outcome::Won) => "won",
            Some(Outcome::Lost) => "lost",
            Some(Outcome::StepLimit) => "step-limit",
            Some(Outcome::Stuck) => "stuck",
            None => "running",
        };
        format!(
            "T:{:5} | Goals:{:4} (left {:3}) | Bonus:{:2} | Eaten:{:2} | Sweeps:{:.1}/step (max {}) | {}",
            self.steps,
            self.goals_eaten,
            self.goals_remaining,
            self.bonuses_eaten,
            self.threats_eaten,
            self.sweeps_mean(),
            self.sweeps_max,
            outcome
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_solve_tracks_totals_and_max() {
        let mut stats = EpisodeStats::new();
        stats.record_solve(12);
        stats.record_solve(30);
        stats.record_solve(7);
        stats.steps = 3;

        assert_eq!(stats.sweeps_total, 49);
        assert_eq!(stats.sweeps_max, 30);
        assert!((stats.sweeps_mean() - 49.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sweeps_mean_handles_zero_steps() {
        let stats = EpisodeStats::new();
        assert_eq!(stats.sweeps_mean(), 0.0);
    }

    #[test]
    fn test_summary_names_outcome() {
        let mut stats = EpisodeStats::new();
        stats.outcome = Some(Outcome::Won);
        assert!(stats.summary().contains("won"));
    }
}
