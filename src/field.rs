//! Shaped reward field construction.
//!
//! A [`RewardField`] is a pair of same-shaped grids (reward and utility)
//! rebuilt from scratch every decision step. Construction is an ordered
//! pipeline of consuming stages, each reading the values the previous
//! stage left behind:
//!
//! 1. base fill (baseline + goal budget, walls blocked)
//! 2. corner shaping (enclosing walls amplify penalties, dampen rewards)
//! 3. threat shaping (direction-biased BFS waves from each threat)
//! 4. goal gradient (multi-source BFS pull toward remaining goals)
//! 5. bonus shaping (power-up value scales with nearby danger)
//!
//! Stage order is a binding contract: later stages scale or add to the
//! numbers earlier stages produced.

use crate::config::{Config, RewardConfig, ShapingConfig};
use crate::geometry::{Coordinate, Heading};
use crate::snapshot::{Snapshot, TrackedThreat};
use std::collections::{HashMap, HashSet, VecDeque};

/// A grid cell: a wall, or an open cell carrying a numeric value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell {
    Blocked,
    Open(f64),
}

impl Cell {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Cell::Blocked)
    }

    /// Numeric value, or `None` for a wall
    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Blocked => None,
            Cell::Open(v) => Some(*v),
        }
    }
}

/// Reward scaling factors keyed to the number of enclosing walls.
/// A cul-de-sac is less attractive as a goal and more dangerous as a
/// dead end, so positive rewards shrink and negative ones grow.
const CORNER_FACTORS: [(f64, f64); 3] = [
    (0.8, 1.25),      // 1 adjacent wall
    (0.6, 5.0 / 3.0), // 2 adjacent walls
    (0.2, 5.0),       // 3 adjacent walls
];

/// The shaped reward/utility grid pair for one decision step
#[derive(Clone, Debug)]
pub struct RewardField {
    width: i32,
    height: i32,
    reward: Vec<Cell>,
    utility: Vec<Cell>,
    /// Deepest reachable hop count from the reference threat; always >= 1
    furthest_distance: u32,
}

impl RewardField {
    /// Build the field from an environment snapshot, running every
    /// shaping stage in order. Construction never fails: empty goal or
    /// threat sets are valid and simply contribute nothing.
    pub fn build(snapshot: &Snapshot, config: &Config) -> Self {
        Self::empty(snapshot)
            .base_fill(snapshot, &config.rewards)
            .shape_corners(snapshot)
            .shape_threats(snapshot, config)
            .shape_goal_gradient(snapshot, &config.shaping)
            .shape_bonuses(snapshot, config)
    }

    /// Allocate the grid pair: walls blocked in both grids, open cells
    /// zeroed
    fn empty(snapshot: &Snapshot) -> Self {
        let width = snapshot.width;
        let height = snapshot.height;
        let mut reward = Vec::with_capacity((width * height) as usize);

        // Row-major storage with row 0 holding the highest y
        for row in 0..height {
            let y = height - 1 - row;
            for x in 0..width {
                if snapshot.is_wall(Coordinate::new(x, y)) {
                    reward.push(Cell::Blocked);
                } else {
                    reward.push(Cell::Open(0.0));
                }
            }
        }

        let utility = reward.clone();
        Self {
            width,
            height,
            reward,
            utility,
            furthest_distance: 1,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Deepest hop count used by the far-field decay; >= 1 by
    /// construction so distance ratios never divide by zero
    pub fn furthest_distance(&self) -> u32 {
        self.furthest_distance
    }

    fn index(&self, pos: Coordinate) -> Option<usize> {
        if pos.x < 0 || pos.x >= self.width || pos.y < 0 || pos.y >= self.height {
            return None;
        }
        Some(((self.height - 1 - pos.y) * self.width + pos.x) as usize)
    }

    /// Reward at `pos`; out-of-range reads as a wall
    pub fn reward(&self, pos: Coordinate) -> Cell {
        self.index(pos).map_or(Cell::Blocked, |i| self.reward[i])
    }

    /// Utility at `pos`; out-of-range reads as a wall
    pub fn utility(&self, pos: Coordinate) -> Cell {
        self.index(pos).map_or(Cell::Blocked, |i| self.utility[i])
    }

    pub fn is_blocked(&self, pos: Coordinate) -> bool {
        self.reward(pos).is_blocked()
    }

    /// Utility as a number, substituting `fallback` for walls and
    /// out-of-range cells. The solver passes the actor's own utility
    /// here: moving into a wall means staying in place.
    pub fn utility_or(&self, pos: Coordinate, fallback: f64) -> f64 {
        self.utility(pos).value().unwrap_or(fallback)
    }

    /// Overwrite the reward at `pos`. Writes to walls are ignored, never
    /// an error: shaping waves may lap against walls freely.
    pub fn set_reward(&mut self, pos: Coordinate, value: f64) {
        if let Some(i) = self.index(pos) {
            if let Cell::Open(v) = &mut self.reward[i] {
                *v = value;
            }
        }
    }

    /// Add `delta` to the reward at `pos` (no-op on walls)
    pub fn add_reward(&mut self, pos: Coordinate, delta: f64) {
        if let Some(i) = self.index(pos) {
            if let Cell::Open(v) = &mut self.reward[i] {
                *v += delta;
            }
        }
    }

    /// Overwrite the utility at `pos` (no-op on walls)
    pub fn set_utility(&mut self, pos: Coordinate, value: f64) {
        if let Some(i) = self.index(pos) {
            if let Cell::Open(v) = &mut self.utility[i] {
                *v = value;
            }
        }
    }

    /// All in-bounds coordinates, row by row
    pub fn coords(&self) -> impl Iterator<Item = Coordinate> + '_ {
        let width = self.width;
        let height = self.height;
        (0..height).flat_map(move |y| (0..width).map(move |x| Coordinate::new(x, y)))
    }

    /// Coordinates of open (non-wall) cells
    pub fn open_coords(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.coords().filter(move |&p| !self.is_blocked(p))
    }

    // ------------------------------------------------------------------
    // Stage 1: base fill
    // ------------------------------------------------------------------

    /// Baseline reward for every open cell, plus each goal's share of
    /// the goal budget. With zero goals the budget contributes nothing.
    fn base_fill(mut self, snapshot: &Snapshot, rewards: &RewardConfig) -> Self {
        let goal_reward = if snapshot.goals.is_empty() {
            0.0
        } else {
            rewards.goal_budget / snapshot.goals.len() as f64
        };

        for pos in self.coords().collect::<Vec<_>>() {
            if self.is_blocked(pos) {
                continue;
            }
            if snapshot.goals.contains(&pos) {
                self.set_reward(pos, goal_reward);
            } else {
                self.set_reward(pos, rewards.base_reward);
            }
        }
        self
    }

    // ------------------------------------------------------------------
    // Stage 2: corner shaping
    // ------------------------------------------------------------------

    /// Scale each open cell's reward by how many walls enclose it.
    /// 0 or 4 enclosing walls leave the cell unchanged.
    fn shape_corners(mut self, snapshot: &Snapshot) -> Self {
        for pos in self.coords().collect::<Vec<_>>() {
            let current = match self.reward(pos).value() {
                Some(v) => v,
                None => continue,
            };

            let walls = pos
                .neighbors()
                .iter()
                .filter(|n| snapshot.is_wall(**n))
                .count();

            if let Some(&(positive, negative)) = walls.checked_sub(1).and_then(|i| CORNER_FACTORS.get(i)) {
                let factor = if current > 0.0 { positive } else { negative };
                self.set_reward(pos, current * factor);
            }
        }
        self
    }

    // ------------------------------------------------------------------
    // Stage 3: threat shaping
    // ------------------------------------------------------------------

    /// Propagate a decaying reward wave outward from every threat.
    ///
    /// With direction history available the wave is biased by each
    /// threat's heading: it only spreads straight ahead or sideways,
    /// never behind the threat, and the cell directly behind gets an
    /// extra penalty. On the very first step (no history, any heading
    /// still `Stop`) the wave is a plain breadth-first flood instead.
    fn shape_threats(mut self, snapshot: &Snapshot, config: &Config) -> Self {
        if snapshot.threats.is_empty() {
            return self;
        }

        let first_step = snapshot
            .threats
            .iter()
            .any(|t| t.heading == Heading::Stop);

        if first_step {
            self.furthest_distance = flood_depth(snapshot, snapshot.threats[0].cell()).max(1);
            for threat in &snapshot.threats {
                self.shape_threat_flood(snapshot, threat.cell(), config);
            }
        } else {
            self.furthest_distance = directional_depth(snapshot, &snapshot.threats[0])
                .max(config.shaping.min_horizon)
                .max(1);
            let agent_distances = distances_from(snapshot, snapshot.agent);
            for (i, threat) in snapshot.threats.iter().enumerate() {
                self.shape_threat_directional(snapshot, threat, i, &agent_distances, config);
            }
        }
        self
    }

    /// Near-field/far-field decay magnitude at hop `distance`
    fn decay(&self, distance: u32, shaping: &ShapingConfig) -> f64 {
        if distance > shaping.threat_aura {
            (1.0 - distance as f64 / self.furthest_distance as f64) * shaping.far_rate
        } else if distance <= 1 {
            shaping.close_multiplier
        } else {
            1.0 - distance as f64 / (shaping.threat_aura + 1) as f64
        }
    }

    /// Direction-agnostic wave used on the first decision step.
    /// Within the aura the clamped near multiplier does not apply; the
    /// plain `1 - d/(aura+1)` ramp runs all the way to the source.
    fn shape_threat_flood(&mut self, snapshot: &Snapshot, source: Coordinate, config: &Config) {
        let shaping = &config.shaping;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((source, 0u32));

        while let Some((pos, distance)) = queue.pop_front() {
            if visited.contains(&pos) || !snapshot.in_bounds(pos) || snapshot.is_wall(pos) {
                continue;
            }
            visited.insert(pos);

            let magnitude = if distance > shaping.threat_aura {
                (1.0 - distance as f64 / self.furthest_distance as f64) * shaping.far_rate
            } else {
                1.0 - distance as f64 / (shaping.threat_aura + 1) as f64
            };

            let current = self.reward(pos).value().unwrap_or(0.0);
            self.set_reward(pos, current + magnitude * config.rewards.threat_penalty);

            for next in pos.neighbors() {
                queue.push_back((next, distance + 1));
            }
        }
    }

    /// Direction-biased wave: spreads only ahead of and beside the
    /// threat, tracking visited (cell, heading) pairs so the same cell
    /// can be reached from different headings without the bias
    /// degenerating into a plain flood.
    fn shape_threat_directional(
        &mut self,
        snapshot: &Snapshot,
        threat: &TrackedThreat,
        threat_index: usize,
        agent_distances: &HashMap<Coordinate, u32>,
        config: &Config,
    ) {
        let shaping = &config.shaping;
        let source = threat.cell();

        // An edible threat the agent can actually reach before the
        // timer runs out is a target, not a hazard: invert the wave and
        // scale it down. Edible but out of reach shapes as dangerous,
        // since it will be dangerous again by the time the agent
        // arrives.
        let reachable_in_time = agent_distances
            .get(&source)
            .map(|&d| (d as f64) <= threat.threat.edible_timer)
            .unwrap_or(false);
        let sign = if threat.is_edible() && reachable_in_time {
            -shaping.edible_scale
        } else {
            1.0
        };

        // Extra penalty on the cell directly behind the threat:
        // chasing from the rear walks into where it just was
        let behind = source.step(threat.heading.opposite());
        if snapshot.in_bounds(behind) && !snapshot.is_wall(behind) {
            self.add_reward(
                behind,
                shaping.rear_penalty_scale * config.rewards.threat_penalty * sign,
            );
        }

        if sign < 0.0 {
            self.penalize_spawn_anchor(snapshot, threat_index, config);
        }

        let mut visited: HashSet<(Coordinate, Heading)> = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((source, threat.heading, 0u32));

        while let Some((pos, heading, distance)) = queue.pop_front() {
            if visited.contains(&(pos, heading)) || !snapshot.in_bounds(pos) || snapshot.is_wall(pos)
            {
                continue;
            }
            visited.insert((pos, heading));

            let magnitude = self.decay(distance, shaping);
            self.add_reward(pos, magnitude * config.rewards.threat_penalty * sign);

            for next_heading in heading.continuations() {
                let next = pos.step(next_heading);
                if next != pos
                    && !visited.contains(&(next, next_heading))
                    && !snapshot.is_wall(next)
                {
                    queue.push_back((next, next_heading, distance + 1));
                }
            }
        }
    }

    /// While a threat is harmless it will respawn dangerous at its
    /// anchor; make the anchor and its immediate neighbors unattractive
    /// so the agent does not camp there waiting to be ambushed.
    fn penalize_spawn_anchor(&mut self, snapshot: &Snapshot, threat_index: usize, config: &Config) {
        let anchor = snapshot
            .spawn_anchors
            .get(threat_index)
            .or_else(|| snapshot.spawn_anchors.first());
        let anchor = match anchor {
            Some(a) => *a,
            None => return,
        };

        let penalty = config.shaping.respawn_penalty_scale * config.rewards.threat_penalty;
        self.add_reward(anchor, penalty);
        for neighbor in anchor.neighbors() {
            self.add_reward(neighbor, penalty);
        }
    }

    // ------------------------------------------------------------------
    // Stage 4: goal gradient
    // ------------------------------------------------------------------

    /// Multi-source BFS from every remaining goal adds a small decaying
    /// pull so cells near goals beat equally-safe cells far from them.
    /// Decays over the goal BFS's own deepest hop count, which keeps
    /// the stage meaningful when there are no threats to derive a
    /// horizon from. Goal cells themselves are untouched (they already
    /// carry their budget share); zero goals makes this a no-op.
    fn shape_goal_gradient(mut self, snapshot: &Snapshot, shaping: &ShapingConfig) -> Self {
        if snapshot.goals.is_empty() {
            return self;
        }

        let distances = multi_source_distances(snapshot, snapshot.goals.iter().copied());
        let depth = distances.values().copied().max().unwrap_or(1).max(1);

        for (&pos, &distance) in &distances {
            if distance == 0 {
                continue;
            }
            let pull = shaping.goal_pull * (1.0 - distance as f64 / depth as f64);
            if pull > 0.0 {
                self.add_reward(pos, pull);
            }
        }
        self
    }

    // ------------------------------------------------------------------
    // Stage 5: bonus shaping
    // ------------------------------------------------------------------

    /// The closer danger is to the agent, the more a power-up pickup is
    /// worth. Searches outward from the agent up to the agent aura; the
    /// nearest threat found sets the reward added to every bonus cell.
    /// While a harmless window is already running, bonus cells get a
    /// flat penalty instead: a second power-up is wasted.
    fn shape_bonuses(mut self, snapshot: &Snapshot, config: &Config) -> Self {
        if snapshot.bonuses.is_empty() {
            return self;
        }

        if snapshot.power_active() {
            for &bonus in &snapshot.bonuses {
                self.add_reward(bonus, config.rewards.held_bonus_penalty);
            }
            return self;
        }

        let aura = config.shaping.agent_aura;
        let threat_cells: HashSet<Coordinate> =
            snapshot.threats.iter().map(|t| t.cell()).collect();

        let mut nearest: Option<u32> = None;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((snapshot.agent, 0u32));

        while let Some((pos, distance)) = queue.pop_front() {
            if visited.contains(&pos)
                || !snapshot.in_bounds(pos)
                || snapshot.is_wall(pos)
                || distance > aura
            {
                continue;
            }
            visited.insert(pos);

            if threat_cells.contains(&pos) {
                nearest = Some(nearest.map_or(distance, |d| d.min(distance)));
            }

            for next in pos.neighbors() {
                queue.push_back((next, distance + 1));
            }
        }

        if let Some(distance) = nearest {
            let reward = (1.0 - distance as f64 / aura as f64) * config.rewards.bonus_reward;
            for &bonus in &snapshot.bonuses {
                self.add_reward(bonus, reward);
            }
        }
        self
    }
}

// ----------------------------------------------------------------------
// Breadth-first distance helpers
// ----------------------------------------------------------------------

/// Hop distances from `source` to every reachable open cell
fn distances_from(snapshot: &Snapshot, source: Coordinate) -> HashMap<Coordinate, u32> {
    multi_source_distances(snapshot, std::iter::once(source))
}

/// Multi-source BFS over open cells
fn multi_source_distances(
    snapshot: &Snapshot,
    sources: impl Iterator<Item = Coordinate>,
) -> HashMap<Coordinate, u32> {
    let mut distances = HashMap::new();
    let mut queue = VecDeque::new();
    for source in sources {
        queue.push_back((source, 0u32));
    }

    while let Some((pos, distance)) = queue.pop_front() {
        if distances.contains_key(&pos) || !snapshot.in_bounds(pos) || snapshot.is_wall(pos) {
            continue;
        }
        distances.insert(pos, distance);
        for next in pos.neighbors() {
            queue.push_back((next, distance + 1));
        }
    }
    distances
}

/// Deepest hop count of a plain flood from `source`
fn flood_depth(snapshot: &Snapshot, source: Coordinate) -> u32 {
    distances_from(snapshot, source)
        .values()
        .copied()
        .max()
        .unwrap_or(0)
}

/// Deepest hop count reachable by a non-reversing walker starting at
/// the threat's cell with its current heading. The state space is
/// (cell, heading) pairs, so a cell may be revisited from a different
/// heading.
fn directional_depth(snapshot: &Snapshot, threat: &TrackedThreat) -> u32 {
    let mut deepest = 0;
    let mut visited: HashSet<(Coordinate, Heading)> = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((threat.cell(), threat.heading, 0u32));

    while let Some((pos, heading, distance)) = queue.pop_front() {
        if visited.contains(&(pos, heading)) || !snapshot.in_bounds(pos) || snapshot.is_wall(pos) {
            continue;
        }
        visited.insert((pos, heading));
        deepest = deepest.max(distance);

        for next_heading in heading.continuations() {
            let next = pos.step(next_heading);
            if next != pos {
                queue.push_back((next, next_heading, distance + 1));
            }
        }
    }
    deepest
}
