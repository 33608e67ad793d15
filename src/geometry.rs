//! Grid coordinates and movement headings.

use serde::{Deserialize, Serialize};

/// A cell position on the grid, 0-indexed, x in [0, width), y in [0, height)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell reached by moving one step along `heading`.
    /// `Stop` returns the coordinate unchanged.
    pub fn step(&self, heading: Heading) -> Coordinate {
        let (dx, dy) = heading.offset();
        Coordinate::new(self.x + dx, self.y + dy)
    }

    /// The four cardinal neighbors, in fixed N, S, E, W order
    pub fn neighbors(&self) -> [Coordinate; 4] {
        [
            self.step(Heading::North),
            self.step(Heading::South),
            self.step(Heading::East),
            self.step(Heading::West),
        ]
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((x, y): (i32, i32)) -> Self {
        Coordinate::new(x, y)
    }
}

/// A movement heading. `Stop` marks "no direction history yet" for
/// threat tracking and is never a candidate action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    North,
    South,
    East,
    West,
    Stop,
}

/// Candidate action order. This order is the tie-break contract for
/// action selection: the first strictly-best heading wins.
pub const CARDINALS: [Heading; 4] = [
    Heading::North,
    Heading::South,
    Heading::East,
    Heading::West,
];

impl Heading {
    /// Grid offset for one step along this heading (y grows northward)
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Heading::North => (0, 1),
            Heading::South => (0, -1),
            Heading::East => (1, 0),
            Heading::West => (-1, 0),
            Heading::Stop => (0, 0),
        }
    }

    /// The reverse heading
    pub fn opposite(&self) -> Heading {
        match self {
            Heading::North => Heading::South,
            Heading::South => Heading::North,
            Heading::East => Heading::West,
            Heading::West => Heading::East,
            Heading::Stop => Heading::Stop,
        }
    }

    /// The two headings perpendicular to this one.
    ///
    /// These are both the sideways slip outcomes of the stochastic
    /// transition model and the turns a non-reversing threat can take.
    pub fn perpendiculars(&self) -> [Heading; 2] {
        match self {
            Heading::North | Heading::South => [Heading::East, Heading::West],
            Heading::East | Heading::West => [Heading::North, Heading::South],
            // Stop has no perpendiculars; callers filter it out first
            Heading::Stop => [Heading::Stop, Heading::Stop],
        }
    }

    /// Headings a threat moving along `self` can continue in:
    /// straight ahead or a perpendicular turn, never strict reversal
    pub fn continuations(&self) -> [Heading; 3] {
        let [a, b] = self.perpendiculars();
        [*self, a, b]
    }
}
