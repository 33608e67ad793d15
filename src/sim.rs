//! Episode simulation: a minimal in-tree harness around the policy core.
//!
//! The real environment owns setup, legal-move queries, and move
//! execution; this module stands in for it so episodes can run
//! end-to-end from a maze file. Threats chase the agent while
//! dangerous, flee while harmless, and never reverse unless dead-ended,
//! which is exactly the movement assumption the directional reward
//! shaping encodes.

use crate::agent::PolicyAgent;
use crate::config::Config;
use crate::geometry::{Coordinate, Heading};
use crate::maze::Maze;
use crate::snapshot::{Observation, Threat};
use crate::stats::{EpisodeStats, Outcome};
use log::debug;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// Live simulation state of one threat
#[derive(Clone, Debug)]
struct SimThreat {
    pos: Coordinate,
    heading: Heading,
    edible_timer: f64,
    /// Cell this threat returns to after being eaten
    spawn: Coordinate,
}

/// One running episode on a maze
pub struct Episode {
    maze: Maze,
    config: Config,
    agent: PolicyAgent,
    agent_pos: Coordinate,
    goals: HashSet<Coordinate>,
    bonuses: HashSet<Coordinate>,
    threats: Vec<SimThreat>,
    time: u64,
    stats: EpisodeStats,
    outcome: Option<Outcome>,
    // Seeded for reproducibility: identical seeds replay identically
    rng: ChaCha8Rng,
    seed: u64,
}

impl Episode {
    /// Start an episode with a specific seed for reproducibility
    pub fn new(maze: Maze, config: Config, seed: u64) -> Result<Self, String> {
        let agent = PolicyAgent::new(config.clone())?;
        let threats = maze
            .threat_spawns
            .iter()
            .map(|&spawn| SimThreat {
                pos: spawn,
                heading: Heading::Stop,
                edible_timer: 0.0,
                spawn,
            })
            .collect();

        let mut stats = EpisodeStats::new();
        stats.goals_remaining = maze.goals.len();

        Ok(Self {
            agent,
            agent_pos: maze.agent_start,
            goals: maze.goals.clone(),
            bonuses: maze.bonuses.clone(),
            threats,
            maze,
            config,
            time: 0,
            stats,
            outcome: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        })
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn agent_pos(&self) -> Coordinate {
        self.agent_pos
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Render the current board state as ASCII
    pub fn render(&self) -> String {
        let threats: Vec<(Coordinate, bool)> = self
            .threats
            .iter()
            .map(|t| (t.pos, t.edible_timer > 0.5))
            .collect();
        self.maze
            .render(self.agent_pos, &self.goals, &self.bonuses, &threats)
    }

    /// Advance the episode by one decision step
    pub fn step(&mut self) {
        if self.is_over() {
            return;
        }

        // Phase 1: the agent decides from a fresh snapshot
        let observation = self.observation();
        let (chosen, solve) = self.agent.decide(&observation);
        self.stats.record_solve(solve.sweeps);

        let chosen = match chosen {
            Some(h) => h,
            None => {
                self.finish(Outcome::Stuck);
                return;
            }
        };

        // Phase 2: the stochastic outcome model decides what actually
        // happens; bumping into a wall means staying in place
        let actual = self.sample_outcome(chosen);
        let next = self.agent_pos.step(actual);
        if self.maze.in_bounds(next) && !self.maze.is_wall(next) {
            self.agent_pos = next;
        }

        self.time += 1;
        self.stats.steps = self.time;
        debug!(
            "t={} intended {:?}, moved {:?} to {:?}",
            self.time, chosen, actual, self.agent_pos
        );

        // Phase 3: consume whatever the agent landed on
        if self.goals.remove(&self.agent_pos) {
            self.stats.goals_eaten += 1;
        }
        if self.bonuses.remove(&self.agent_pos) {
            self.stats.bonuses_eaten += 1;
            for threat in &mut self.threats {
                threat.edible_timer = self.config.sim.edible_steps;
            }
        }

        // Phase 4: contact resolution, then threat movement, then
        // contact again (threats can walk into the agent too)
        if self.resolve_contacts() {
            return;
        }
        self.move_threats();
        for threat in &mut self.threats {
            threat.edible_timer = (threat.edible_timer - 1.0).max(0.0);
        }
        if self.resolve_contacts() {
            return;
        }

        // Phase 5: termination checks
        self.stats.goals_remaining = self.goals.len();
        if self.goals.is_empty() {
            self.finish(Outcome::Won);
        } else if self.time >= self.config.sim.max_steps {
            self.finish(Outcome::StepLimit);
        }
    }

    /// Run until the episode ends or `steps` more steps elapse
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            if self.is_over() {
                break;
            }
            self.step();
        }
    }

    /// Run with a callback after each step (display, logging)
    pub fn run_with_callback<F>(&mut self, steps: u64, mut callback: F)
    where
        F: FnMut(&Episode),
    {
        for _ in 0..steps {
            if self.is_over() {
                break;
            }
            self.step();
            callback(self);
        }
    }

    /// The harness-side view handed to the agent each step
    fn observation(&self) -> Observation {
        Observation {
            width: self.maze.width,
            height: self.maze.height,
            walls: self.maze.walls.clone(),
            goals: self.goals.clone(),
            bonuses: self.bonuses.clone(),
            threats: self
                .threats
                .iter()
                .map(|t| Threat::new((t.pos.x as f64, t.pos.y as f64), t.edible_timer))
                .collect(),
            spawn_anchors: self.threats.iter().map(|t| t.spawn).collect(),
            agent: self.agent_pos,
            legal: self.maze.legal_headings(self.agent_pos),
        }
    }

    /// Sample the actual heading for an intended one: straight with
    /// p_same, each perpendicular slip with p_perp
    fn sample_outcome(&mut self, intended: Heading) -> Heading {
        let roll: f64 = self.rng.gen();
        let p_same = self.config.solver.p_same;
        let p_perp = self.config.solver.p_perp;
        let [left, right] = intended.perpendiculars();

        if roll < p_same {
            intended
        } else if roll < p_same + p_perp {
            left
        } else {
            right
        }
    }

    /// Handle agent/threat cohabitation. Returns true when the episode
    /// ended (capture).
    fn resolve_contacts(&mut self) -> bool {
        let agent_pos = self.agent_pos;
        let mut captured = false;

        for threat in &mut self.threats {
            if threat.pos != agent_pos {
                continue;
            }
            if threat.edible_timer > 0.5 {
                // Eaten: back to the spawn anchor, dangerous again
                threat.pos = threat.spawn;
                threat.heading = Heading::Stop;
                threat.edible_timer = 0.0;
                self.stats.threats_eaten += 1;
            } else {
                captured = true;
            }
        }

        if captured {
            self.finish(Outcome::Lost);
        }
        captured
    }

    /// Move every threat one cell: chase while dangerous, flee while
    /// harmless, never reversing unless the only way out is backwards
    fn move_threats(&mut self) {
        let agent_pos = self.agent_pos;

        for i in 0..self.threats.len() {
            let (pos, heading, edible) = {
                let t = &self.threats[i];
                (t.pos, t.heading, t.edible_timer > 0.5)
            };

            let mut candidates = self.maze.legal_headings(pos);
            if heading != Heading::Stop && candidates.len() > 1 {
                candidates.retain(|h| *h != heading.opposite());
            }
            if candidates.is_empty() {
                continue;
            }

            let score = |h: &Heading| {
                let next = pos.step(*h);
                let d = (next.x - agent_pos.x).abs() + (next.y - agent_pos.y).abs();
                if edible {
                    -d
                } else {
                    d
                }
            };
            let best = candidates.iter().map(score).min().unwrap_or(0);
            let best_candidates: Vec<Heading> = candidates
                .into_iter()
                .filter(|h| score(h) == best)
                .collect();

            let chosen = best_candidates[self.rng.gen_range(0..best_candidates.len())];
            self.threats[i].pos = pos.step(chosen);
            self.threats[i].heading = chosen;
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        self.stats.outcome = Some(outcome);
        self.stats.goals_remaining = self.goals.len();
        self.agent.reset();
        debug!("episode over after {} steps: {:?}", self.time, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN_ARENA: &str = "\
%%%%%%%
%P    %
%     %
%    .%
%%%%%%%";

    #[test]
    fn test_episode_collects_lone_goal() {
        let maze = Maze::parse(OPEN_ARENA).unwrap();
        let mut episode = Episode::new(maze, Config::default(), 7).unwrap();
        episode.run(200);

        assert_eq!(episode.outcome(), Some(Outcome::Won));
        assert_eq!(episode.stats().goals_eaten, 1);
        assert_eq!(episode.stats().goals_remaining, 0);
    }

    #[test]
    fn test_seeded_episodes_replay_identically() {
        let maze = Maze::parse(OPEN_ARENA).unwrap();
        let mut first = Episode::new(maze.clone(), Config::default(), 99).unwrap();
        let mut second = Episode::new(maze, Config::default(), 99).unwrap();

        first.run(50);
        second.run(50);

        assert_eq!(first.time(), second.time());
        assert_eq!(first.agent_pos(), second.agent_pos());
        assert_eq!(first.outcome(), second.outcome());
    }

    #[test]
    fn test_step_after_end_is_inert() {
        let maze = Maze::parse(OPEN_ARENA).unwrap();
        let mut episode = Episode::new(maze, Config::default(), 7).unwrap();
        episode.run(200);

        let time = episode.time();
        episode.step();
        assert_eq!(episode.time(), time);
    }

    #[test]
    fn test_bonus_turns_threats_edible() {
        let layout = "\
%%%%%%%%
%Po   G%
%......%
%%%%%%%%";
        let maze = Maze::parse(layout).unwrap();
        let mut episode = Episode::new(maze, Config::default(), 3).unwrap();

        // Walk until the bonus is eaten or the episode ends
        while !episode.is_over() && episode.stats().bonuses_eaten == 0 {
            episode.step();
        }

        if episode.stats().bonuses_eaten > 0 && !episode.is_over() {
            assert!(episode.threats.iter().any(|t| t.edible_timer > 0.0));
        }
    }

    #[test]
    fn test_render_shows_agent() {
        let maze = Maze::parse(OPEN_ARENA).unwrap();
        let episode = Episode::new(maze, Config::default(), 1).unwrap();
        assert!(episode.render().contains('P'));
    }
}
