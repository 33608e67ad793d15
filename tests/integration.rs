//! Integration tests for QUARRY

use quarry::snapshot::{Observation, Threat};
use quarry::{Config, Coordinate, Episode, Heading, Maze, Outcome, PolicyAgent};
use std::collections::HashSet;

/// Observation over a fully open grid with no boundary walls
fn open_observation(width: i32, height: i32, agent: Coordinate) -> Observation {
    let legal = [Heading::North, Heading::South, Heading::East, Heading::West]
        .iter()
        .copied()
        .filter(|h| {
            let next = agent.step(*h);
            next.x >= 0 && next.x < width && next.y >= 0 && next.y < height
        })
        .collect();

    Observation {
        width,
        height,
        walls: HashSet::new(),
        goals: HashSet::new(),
        bonuses: HashSet::new(),
        threats: Vec::new(),
        spawn_anchors: Vec::new(),
        agent,
        legal,
    }
}

/// Walled corridor of the given width, open cells at y == 1
fn corridor_observation(width: i32, agent: Coordinate) -> Observation {
    let mut walls = HashSet::new();
    for x in 0..width {
        walls.insert(Coordinate::new(x, 0));
        walls.insert(Coordinate::new(x, 2));
    }
    walls.insert(Coordinate::new(0, 1));
    walls.insert(Coordinate::new(width - 1, 1));

    let legal = [Heading::East, Heading::West]
        .iter()
        .copied()
        .filter(|h| !walls.contains(&agent.step(*h)))
        .collect();

    Observation {
        width,
        height: 3,
        walls,
        goals: HashSet::new(),
        bonuses: HashSet::new(),
        threats: Vec::new(),
        spawn_anchors: Vec::new(),
        agent,
        legal,
    }
}

#[test]
fn test_open_grid_walks_to_goal() {
    // 5x5 fully open grid, goal in the far corner: every chosen heading
    // must cut the remaining distance, reaching the goal within 8 steps
    let goal = Coordinate::new(4, 4);
    let mut agent_pos = Coordinate::new(0, 0);
    let mut agent = PolicyAgent::new(Config::default()).unwrap();

    let mut steps = 0;
    while agent_pos != goal {
        let mut observation = open_observation(5, 5, agent_pos);
        observation.goals.insert(goal);

        let (chosen, stats) = agent.decide(&observation);
        assert!(stats.converged);

        let heading = chosen.expect("open grid always offers a move");
        let next = agent_pos.step(heading);

        let before = (goal.x - agent_pos.x).abs() + (goal.y - agent_pos.y).abs();
        let after = (goal.x - next.x).abs() + (goal.y - next.y).abs();
        assert!(
            after < before,
            "step {} moved {:?} -> {:?}, distance {} -> {}",
            steps,
            agent_pos,
            next,
            before,
            after
        );

        agent_pos = next;
        steps += 1;
        assert!(steps <= 8, "goal not reached within 8 steps");
    }
}

#[test]
fn test_corridor_moves_toward_edible_threat() {
    // A harmless threat whose timer comfortably exceeds the distance to
    // it is a target: the agent must advance on it, not retreat
    let agent_cell = Coordinate::new(2, 1);
    let mut agent = PolicyAgent::new(Config::default()).unwrap();

    // First observation establishes the threat's position history
    let mut observation = corridor_observation(12, agent_cell);
    observation.threats.push(Threat::new((8.0, 1.0), 31.0));
    agent.decide(&observation);

    // Threat has moved one cell toward the agent: heading now known
    let mut observation = corridor_observation(12, agent_cell);
    observation.threats.push(Threat::new((7.0, 1.0), 30.0));
    let (chosen, _) = agent.decide(&observation);

    assert_eq!(chosen, Some(Heading::East));
}

#[test]
fn test_adjacent_threat_takes_escape_route() {
    // Dangerous threat right next door, one open escape cell: the
    // solver must pick the escape heading over walking into the threat
    let mut walls = HashSet::new();
    for x in 0..5 {
        walls.insert(Coordinate::new(x, 0));
        walls.insert(Coordinate::new(x, 3));
    }
    walls.insert(Coordinate::new(0, 1));
    walls.insert(Coordinate::new(0, 2));
    walls.insert(Coordinate::new(4, 1));
    walls.insert(Coordinate::new(4, 2));
    walls.insert(Coordinate::new(2, 2));
    walls.insert(Coordinate::new(3, 2));

    let agent_cell = Coordinate::new(1, 1);
    let base = Observation {
        width: 5,
        height: 4,
        walls,
        goals: HashSet::new(),
        bonuses: HashSet::new(),
        threats: Vec::new(),
        spawn_anchors: Vec::new(),
        agent: agent_cell,
        legal: vec![Heading::North, Heading::East],
    };

    let mut agent = PolicyAgent::new(Config::default()).unwrap();

    let mut observation = base.clone();
    observation.threats.push(Threat::new((3.0, 1.0), 0.0));
    agent.decide(&observation);

    let mut observation = base.clone();
    observation.threats.push(Threat::new((2.0, 1.0), 0.0));
    let (chosen, _) = agent.decide(&observation);

    // North leads to the pocket at (1,2); East walks into the threat
    assert_eq!(chosen, Some(Heading::North));
}

#[test]
fn test_identical_snapshots_identical_policy() {
    // Full entity mix: goals, bonuses, threats with history. Two agents
    // fed the same observations must agree on every step.
    let maze = Maze::parse(
        "\
%%%%%%%%%%
%P..  o G%
%.%% %%%.%
%.    G..%
%%%%%%%%%%",
    )
    .unwrap();

    let mut first = Episode::new(maze.clone(), Config::default(), 1234).unwrap();
    let mut second = Episode::new(maze, Config::default(), 1234).unwrap();

    first.run(40);
    second.run(40);

    assert_eq!(first.time(), second.time());
    assert_eq!(first.agent_pos(), second.agent_pos());
    assert_eq!(first.outcome(), second.outcome());
    assert_eq!(first.stats().goals_eaten, second.stats().goals_eaten);
}

#[test]
fn test_full_episode_cycle() {
    let maze = Maze::parse(
        "\
%%%%%%%%%
%P ..   %
% %%%%% %
%   o  G%
%%%%%%%%%",
    )
    .unwrap();

    let mut episode = Episode::new(maze, Config::default(), 42).unwrap();
    episode.run(300);

    let stats = episode.stats();
    assert!(episode.time() > 0);
    assert!(stats.steps == episode.time());
    assert!(stats.sweeps_total > 0);
    assert!(stats.sweeps_mean() > 0.0);

    // An episode that ended has a consistent outcome record
    if let Some(outcome) = episode.outcome() {
        assert_eq!(stats.outcome, Some(outcome));
        if outcome == Outcome::Won {
            assert_eq!(stats.goals_remaining, 0);
        }
    }
}

#[test]
fn test_won_episode_clears_all_goals() {
    // No threats: the agent should always clear the board
    let maze = Maze::parse(
        "\
%%%%%%%%
%P     %
% .. . %
%    . %
%%%%%%%%",
    )
    .unwrap();

    let mut episode = Episode::new(maze, Config::default(), 5).unwrap();
    episode.run(500);

    assert_eq!(episode.outcome(), Some(Outcome::Won));
    assert_eq!(episode.stats().goals_remaining, 0);
    assert_eq!(episode.stats().goals_eaten, 4);
}
