//! ASCII maze layouts.
//!
//! The layout format mirrors classic maze files: `%` walls, `.` goals,
//! `o` bonuses, `G` threat spawns, `P` the agent's start, spaces open
//! floor. The first text line is the top of the maze (highest y).

use crate::geometry::{Coordinate, Heading, CARDINALS};
use std::collections::HashSet;

/// A parsed maze layout: static geometry plus starting entity positions
#[derive(Clone, Debug)]
pub struct Maze {
    pub width: i32,
    pub height: i32,
    pub walls: HashSet<Coordinate>,
    pub goals: HashSet<Coordinate>,
    pub bonuses: HashSet<Coordinate>,
    /// Threat starting cells; each doubles as that threat's spawn anchor
    pub threat_spawns: Vec<Coordinate>,
    pub agent_start: Coordinate,
}

impl Maze {
    /// Parse a maze from its ASCII layout.
    ///
    /// The layout must be rectangular and contain exactly one `P`.
    pub fn parse(text: &str) -> Result<Maze, String> {
        let lines: Vec<&str> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return Err("maze layout is empty".to_string());
        }

        let height = lines.len() as i32;
        let width = lines[0].chars().count() as i32;

        let mut walls = HashSet::new();
        let mut goals = HashSet::new();
        let mut bonuses = HashSet::new();
        let mut threat_spawns = Vec::new();
        let mut agent_start = None;

        for (row, line) in lines.iter().enumerate() {
            if line.chars().count() as i32 != width {
                return Err(format!(
                    "maze layout is ragged: line {} has {} cells, expected {}",
                    row + 1,
                    line.chars().count(),
                    width
                ));
            }

            let y = height - 1 - row as i32;
            for (col, ch) in line.chars().enumerate() {
                let pos = Coordinate::new(col as i32, y);
                match ch {
                    '%' | '#' => {
                        walls.insert(pos);
                    }
                    '.' => {
                        goals.insert(pos);
                    }
                    'o' => {
                        bonuses.insert(pos);
                    }
                    'G' => threat_spawns.push(pos),
                    'P' => {
                        if agent_start.is_some() {
                            return Err("maze layout has more than one agent start".to_string());
                        }
                        agent_start = Some(pos);
                    }
                    ' ' => {}
                    other => {
                        return Err(format!(
                            "unrecognized maze character {:?} at line {}, column {}",
                            other,
                            row + 1,
                            col + 1
                        ));
                    }
                }
            }
        }

        let agent_start = agent_start.ok_or("maze layout has no agent start (P)")?;
        if walls.contains(&agent_start) {
            return Err("agent start lies inside a wall".to_string());
        }
        for spawn in &threat_spawns {
            if walls.contains(spawn) {
                return Err("threat spawn lies inside a wall".to_string());
            }
        }

        Ok(Maze {
            width,
            height,
            walls,
            goals,
            bonuses,
            threat_spawns,
            agent_start,
        })
    }

    pub fn in_bounds(&self, pos: Coordinate) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    pub fn is_wall(&self, pos: Coordinate) -> bool {
        self.walls.contains(&pos)
    }

    /// Headings leading to an in-bounds, non-wall cell
    pub fn legal_headings(&self, pos: Coordinate) -> Vec<Heading> {
        CARDINALS
            .iter()
            .copied()
            .filter(|h| {
                let next = pos.step(*h);
                self.in_bounds(next) && !self.is_wall(next)
            })
            .collect()
    }

    /// Render the maze with live entity positions overlaid.
    ///
    /// Threats render as `G` (dangerous) or `g` (harmless); the agent
    /// wins any overlap so a capture frame is still readable.
    pub fn render(
        &self,
        agent: Coordinate,
        goals: &HashSet<Coordinate>,
        bonuses: &HashSet<Coordinate>,
        threats: &[(Coordinate, bool)],
    ) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for row in 0..self.height {
            let y = self.height - 1 - row;
            for x in 0..self.width {
                let pos = Coordinate::new(x, y);
                let ch = if pos == agent {
                    'P'
                } else if let Some((_, edible)) = threats.iter().find(|(p, _)| *p == pos) {
                    if *edible {
                        'g'
                    } else {
                        'G'
                    }
                } else if self.is_wall(pos) {
                    '%'
                } else if bonuses.contains(&pos) {
                    'o'
                } else if goals.contains(&pos) {
                    '.'
                } else {
                    ' '
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}
