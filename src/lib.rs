//! # QUARRY
//!
//! MDP-based pursuit/evasion policy engine for grid mazes.
//!
//! Each decision step the engine shapes a reward field from the live
//! positions of threats, goals, and terrain, solves the resulting MDP
//! by value iteration under stochastic action outcomes, and returns
//! the single best heading for the controlled entity's cell.
//!
//! ## Features
//!
//! - **Directional threat model**: avoidance waves follow each threat's
//!   inferred heading, never behind it
//! - **Convergence-bounded**: value iteration stops at a configurable
//!   epsilon, with a hard sweep ceiling as a safety valve
//! - **Configurable**: every shaping constant lives in a YAML config
//! - **Reproducible**: seeded episode simulation for regression tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry::{Config, Episode, Maze};
//!
//! let maze = Maze::parse("%%%%%\n%P..%\n%%%%%").unwrap();
//! let mut episode = Episode::new(maze, Config::default(), 42).unwrap();
//!
//! episode.run(500);
//! println!("{}", episode.stats().summary());
//! ```
//!
//! ## One decision at a time
//!
//! ```rust,no_run
//! use quarry::{Config, PolicyAgent};
//!
//! let mut agent = PolicyAgent::new(Config::default()).unwrap();
//! // build an Observation from the live environment, then:
//! // let (heading, stats) = agent.decide(&observation);
//! ```

pub mod agent;
pub mod config;
pub mod field;
pub mod geometry;
pub mod maze;
pub mod sim;
pub mod snapshot;
pub mod solver;
pub mod stats;

// Re-export main types
pub use agent::PolicyAgent;
pub use config::Config;
pub use field::{Cell, RewardField};
pub use geometry::{Coordinate, Heading};
pub use maze::Maze;
pub use sim::Episode;
pub use snapshot::{Observation, Snapshot, Threat, ThreatMemory};
pub use solver::{SolveStats, TransitionModel};
pub use stats::{EpisodeStats, Outcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark on a synthetic arena
pub fn benchmark(width: i32, height: i32, decisions: u64) -> BenchmarkResult {
    use std::time::Instant;

    let maze = Maze::parse(&synthetic_layout(width, height)).expect("synthetic layout is valid");
    let mut episode = Episode::new(maze, Config::default(), 42).expect("default config is valid");

    let start = Instant::now();
    episode.run(decisions);
    let elapsed = start.elapsed();
    let steps = episode.stats().steps.max(1);

    BenchmarkResult {
        width,
        height,
        decisions: steps,
        sweeps_mean: episode.stats().sweeps_mean(),
        elapsed_secs: elapsed.as_secs_f64(),
        decisions_per_second: steps as f64 / elapsed.as_secs_f64(),
    }
}

/// Deterministic arena for benchmarks: wall ring, pillar lattice,
/// goals along the far edge, two threats opposite the agent
fn synthetic_layout(width: i32, height: i32) -> String {
    let width = width.max(7);
    let height = height.max(7);
    let mut out = String::new();

    for row in 0..height {
        for col in 0..width {
            let edge = row == 0 || row == height - 1 || col == 0 || col == width - 1;
            let ch = if edge {
                '%'
            } else if row == 1 && col == 1 {
                'P'
            } else if row == 1 && (col == width - 2 || col == width - 3) {
                'G'
            } else if row == height - 2 && col > 1 {
                '.'
            } else if row % 2 == 0 && col % 2 == 0 {
                '%'
            } else {
                ' '
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub width: i32,
    pub height: i32,
    pub decisions: u64,
    pub sweeps_mean: f64,
    pub elapsed_secs: f64,
    pub decisions_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Grid: {}x{}", self.width, self.height)?;
        writeln!(f, "Decisions: {}", self.decisions)?;
        writeln!(f, "Mean sweeps/decision: {:.1}", self.sweeps_mean)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} decisions/s", self.decisions_per_second)?;
        Ok(())
    }
}
