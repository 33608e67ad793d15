//! Environment snapshot types and cross-step threat tracking.
//!
//! The solver core is pure: it consumes a [`Snapshot`] of the environment
//! each decision step and carries no state of its own. The only state that
//! survives between steps is [`ThreatMemory`], which pairs consecutive
//! threat observations to infer each threat's travel heading.

use crate::geometry::{Coordinate, Heading};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single observation of a mobile threat.
///
/// Positions come from the environment as fractional pairs (threats may
/// be rendered mid-cell); they are truncated to cell coordinates on use.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Threat {
    pub pos: (f64, f64),
    /// Remaining harmless steps; 0 means dangerous
    pub edible_timer: f64,
}

impl Threat {
    pub fn new(pos: (f64, f64), edible_timer: f64) -> Self {
        Self { pos, edible_timer }
    }

    /// The grid cell this threat occupies (fractional position truncated)
    pub fn cell(&self) -> Coordinate {
        Coordinate::new(self.pos.0 as i32, self.pos.1 as i32)
    }

    pub fn is_edible(&self) -> bool {
        self.edible_timer > 0.5
    }
}

/// A threat observation enriched with the heading inferred from the
/// previous decision step
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TrackedThreat {
    pub threat: Threat,
    pub heading: Heading,
}

impl TrackedThreat {
    pub fn cell(&self) -> Coordinate {
        self.threat.cell()
    }

    pub fn is_edible(&self) -> bool {
        self.threat.is_edible()
    }
}

/// Everything the core reads in one decision step.
///
/// The goal and bonus sets are read-only snapshots: the harness shrinks
/// them between steps as items are consumed, and a fresh snapshot is
/// taken each step. Walls are immutable for the episode.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub width: i32,
    pub height: i32,
    pub walls: HashSet<Coordinate>,
    pub goals: HashSet<Coordinate>,
    pub bonuses: HashSet<Coordinate>,
    pub threats: Vec<TrackedThreat>,
    /// Cells threats return to after being eaten
    pub spawn_anchors: Vec<Coordinate>,
    pub agent: Coordinate,
}

impl Snapshot {
    pub fn in_bounds(&self, pos: Coordinate) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    pub fn is_wall(&self, pos: Coordinate) -> bool {
        self.walls.contains(&pos)
    }

    /// True while any threat is in its harmless window
    pub fn power_active(&self) -> bool {
        self.threats.iter().any(|t| t.is_edible())
    }
}

/// One decision step's raw view of the environment, as the harness
/// reports it: threats carry no heading yet (that is [`ThreatMemory`]'s
/// job) and the legal-heading set may still contain the no-op heading.
#[derive(Clone, Debug)]
pub struct Observation {
    pub width: i32,
    pub height: i32,
    pub walls: HashSet<Coordinate>,
    pub goals: HashSet<Coordinate>,
    pub bonuses: HashSet<Coordinate>,
    pub threats: Vec<Threat>,
    pub spawn_anchors: Vec<Coordinate>,
    pub agent: Coordinate,
    /// Headings the environment allows at the agent's cell
    pub legal: Vec<Heading>,
}

/// Tolerance when comparing consecutive fractional threat positions
const DIRECTION_EPSILON: f64 = 0.1;

/// Session state carried across decision steps: the previous position of
/// each threat, used to infer its travel heading.
///
/// Threats are matched by list index between steps (the environment
/// reports them in a stable order). A threat seen for the first time has
/// heading [`Heading::Stop`]. Reset when an episode ends.
#[derive(Clone, Debug, Default)]
pub struct ThreatMemory {
    previous: Vec<(f64, f64)>,
}

impl ThreatMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the current observations into memory, returning each threat
    /// paired with its inferred heading
    pub fn observe(&mut self, threats: &[Threat]) -> Vec<TrackedThreat> {
        let tracked = threats
            .iter()
            .enumerate()
            .map(|(i, &threat)| {
                let heading = match self.previous.get(i) {
                    Some(&prev) => infer_heading(prev, threat.pos),
                    None => Heading::Stop,
                };
                TrackedThreat { threat, heading }
            })
            .collect();

        self.previous = threats.iter().map(|t| t.pos).collect();
        tracked
    }

    /// Forget all history (episode end)
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

/// Infer a travel heading from two consecutive fractional positions.
/// Diagonal or sub-tolerance movement reads as `Stop`.
fn infer_heading(prev: (f64, f64), current: (f64, f64)) -> Heading {
    let dx = current.0 - prev.0;
    let dy = current.1 - prev.1;

    if dx.abs() < DIRECTION_EPSILON && dy > DIRECTION_EPSILON {
        Heading::North
    } else if dx.abs() < DIRECTION_EPSILON && dy < -DIRECTION_EPSILON {
        Heading::South
    } else if dx > DIRECTION_EPSILON && dy.abs() < DIRECTION_EPSILON {
        Heading::East
    } else if dx < -DIRECTION_EPSILON && dy.abs() < DIRECTION_EPSILON {
        Heading::West
    } else {
        Heading::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_stop() {
        let mut memory = ThreatMemory::new();
        let tracked = memory.observe(&[Threat::new((3.0, 4.0), 0.0)]);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].heading, Heading::Stop);
    }

    #[test]
    fn test_heading_inferred_from_consecutive_positions() {
        let mut memory = ThreatMemory::new();
        memory.observe(&[Threat::new((3.0, 4.0), 0.0)]);
        let tracked = memory.observe(&[Threat::new((3.0, 5.0), 0.0)]);
        assert_eq!(tracked[0].heading, Heading::North);

        let tracked = memory.observe(&[Threat::new((2.0, 5.0), 0.0)]);
        assert_eq!(tracked[0].heading, Heading::West);
    }

    #[test]
    fn test_stationary_threat_reads_as_stop() {
        let mut memory = ThreatMemory::new();
        memory.observe(&[Threat::new((3.0, 4.0), 0.0)]);
        let tracked = memory.observe(&[Threat::new((3.0, 4.05), 0.0)]);
        assert_eq!(tracked[0].heading, Heading::Stop);
    }

    #[test]
    fn test_new_threat_mid_episode_starts_at_stop() {
        let mut memory = ThreatMemory::new();
        memory.observe(&[Threat::new((3.0, 4.0), 0.0)]);
        let tracked = memory.observe(&[
            Threat::new((3.0, 5.0), 0.0),
            Threat::new((8.0, 8.0), 0.0),
        ]);
        assert_eq!(tracked[0].heading, Heading::North);
        assert_eq!(tracked[1].heading, Heading::Stop);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut memory = ThreatMemory::new();
        memory.observe(&[Threat::new((3.0, 4.0), 0.0)]);
        memory.reset();
        assert!(memory.is_empty());
        let tracked = memory.observe(&[Threat::new((3.0, 5.0), 0.0)]);
        assert_eq!(tracked[0].heading, Heading::Stop);
    }

    #[test]
    fn test_fractional_position_truncates_to_cell() {
        let threat = Threat::new((3.5, 4.9), 0.0);
        assert_eq!(threat.cell(), Coordinate::new(3, 4));
    }
}
