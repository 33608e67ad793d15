//! Configuration system for the policy engine.
//!
//! Supports YAML configuration files with sensible defaults. Every
//! shaping constant is configuration, not a hard-wired invariant: the
//! defaults reproduce the calibrated values, but any of them may be
//! tuned per map without touching the engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rewards: RewardConfig,
    pub shaping: ShapingConfig,
    pub solver: SolverConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Base reward magnitudes written into the field before shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Uniform baseline for open cells (negative: standing still costs)
    pub base_reward: f64,
    /// Reward carried by a dangerous threat's shaping wave (negative)
    pub threat_penalty: f64,
    /// Total reward budget split evenly across remaining goals
    pub goal_budget: f64,
    /// Peak reward added to bonus-pickup cells when danger is near
    pub bonus_reward: f64,
    /// Flat adjustment to bonus cells while a harmless window is active
    pub held_bonus_penalty: f64,
}

/// Distance-shaping parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapingConfig {
    /// Hop radius of the steep near-field decay around a threat
    pub threat_aura: u32,
    /// Hop radius searched around the agent for bonus shaping
    pub agent_aura: u32,
    /// Far-field decay rate beyond the threat aura
    pub far_rate: f64,
    /// Multiplier applied at hop distance <= 1 from a threat
    pub close_multiplier: f64,
    /// Floor for the furthest-distance horizon in directional mode
    pub min_horizon: u32,
    /// Scale applied to an edible threat's (inverted) shaping wave
    pub edible_scale: f64,
    /// Scale of the extra penalty on the cell behind a threat
    pub rear_penalty_scale: f64,
    /// Scale of the penalty window around a spawn anchor while its
    /// threat is harmless
    pub respawn_penalty_scale: f64,
    /// Peak of the goal-distance gradient added to non-goal cells
    pub goal_pull: f64,
}

/// Value-iteration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Discount factor, must lie strictly inside (0, 1)
    pub discount: f64,
    /// Probability the intended heading is the actual outcome
    pub p_same: f64,
    /// Probability of each perpendicular slip (p_same + 2*p_perp = 1)
    pub p_perp: f64,
    /// Convergence threshold on the max per-cell utility change
    pub epsilon: f64,
    /// Hard ceiling on sweeps, the safety valve against misconfiguration
    pub max_sweeps: u32,
}

/// Episode simulation parameters (harness side)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Harmless steps granted to every threat when a bonus is eaten
    pub edible_steps: f64,
    /// Step cap before an episode is called off
    pub max_steps: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rewards: RewardConfig::default(),
            shaping: ShapingConfig::default(),
            solver: SolverConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_reward: -20.0,
            threat_penalty: -250.0,
            goal_budget: 375.0,
            bonus_reward: 200.0,
            held_bonus_penalty: -200.0,
        }
    }
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            threat_aura: 5,
            agent_aura: 6,
            far_rate: 0.05,
            close_multiplier: 2.0,
            min_horizon: 10,
            edible_scale: 0.5,
            rear_penalty_scale: 2.0,
            respawn_penalty_scale: 2.0,
            goal_pull: 2.0,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            discount: 0.8,
            p_same: 0.8,
            p_perp: 0.1,
            epsilon: 0.01,
            max_sweeps: 1000,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            edible_steps: 40.0,
            max_steps: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// A discount outside (0, 1) or outcome probabilities that do not
    /// sum to 1 break the contraction argument behind value-iteration
    /// convergence, so they are rejected here rather than detected as a
    /// runaway sweep later.
    pub fn validate(&self) -> Result<(), String> {
        let s = &self.solver;
        if !(s.discount > 0.0 && s.discount < 1.0) {
            return Err(format!(
                "discount must lie strictly inside (0, 1), got {}",
                s.discount
            ));
        }
        if !(0.0..=1.0).contains(&s.p_same) || !(0.0..=1.0).contains(&s.p_perp) {
            return Err("outcome probabilities must lie in [0, 1]".to_string());
        }
        if (s.p_same + 2.0 * s.p_perp - 1.0).abs() > 1e-9 {
            return Err(format!(
                "outcome probabilities must satisfy p_same + 2*p_perp = 1, got {} + 2*{}",
                s.p_same, s.p_perp
            ));
        }
        if s.epsilon <= 0.0 {
            return Err("epsilon must be > 0".to_string());
        }
        if s.max_sweeps == 0 {
            return Err("max_sweeps must be > 0".to_string());
        }
        if self.shaping.threat_aura == 0 || self.shaping.agent_aura == 0 {
            return Err("aura radii must be > 0".to_string());
        }
        if self.shaping.min_horizon == 0 {
            return Err("min_horizon must be > 0".to_string());
        }
        if self.shaping.edible_scale < 0.0 {
            return Err("edible_scale must be >= 0".to_string());
        }
        if self.sim.max_steps == 0 {
            return Err("max_steps must be > 0".to_string());
        }
        Ok(())
    }
}
