//! QUARRY - CLI entry point.
//!
//! MDP-based pursuit/evasion policy engine for grid mazes.

use clap::{Parser, Subcommand};
use quarry::maze::Maze;
use quarry::snapshot::{Observation, Threat};
use quarry::{benchmark, Config, Episode, PolicyAgent};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "MDP-based pursuit/evasion policy engine for grid mazes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the best heading for a maze's starting position
    Solve {
        /// Maze layout file
        map: PathBuf,

        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Print the board before the answer
        #[arg(short, long)]
        show: bool,
    },

    /// Run a full episode on a maze
    Run {
        /// Maze layout file
        map: PathBuf,

        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Step cap override (defaults to the config's max_steps)
        #[arg(short, long)]
        steps: Option<u64>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Render the board after every step
        #[arg(short, long)]
        watch: bool,

        /// Quiet mode (summary line only)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run a performance benchmark on a synthetic arena
    Bench {
        /// Arena width
        #[arg(long, default_value = "21")]
        width: i32,

        /// Arena height
        #[arg(long, default_value = "15")]
        height: i32,

        /// Number of decision steps
        #[arg(short, long, default_value = "100")]
        decisions: u64,
    },

    /// Generate a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve { map, config, show } => solve_once(map, config, show),

        Commands::Run {
            map,
            config,
            steps,
            seed,
            watch,
            quiet,
        } => run_episode(map, config, steps, seed, watch, quiet),

        Commands::Bench {
            width,
            height,
            decisions,
        } => run_benchmark(width, height, decisions),

        Commands::Init { output } => generate_config(output),
    }
}

/// Load the config file, falling back to defaults when it is absent
fn load_config(path: &PathBuf, quiet: bool) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        if !quiet {
            println!("Loading config from: {:?}", path);
        }
        Config::from_file(path)
    } else {
        if !quiet {
            println!("Using default configuration");
        }
        Ok(Config::default())
    }
}

fn solve_once(
    map: PathBuf,
    config_path: PathBuf,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path, false)?;
    let maze = Maze::parse(&std::fs::read_to_string(&map)?)?;

    let observation = Observation {
        width: maze.width,
        height: maze.height,
        walls: maze.walls.clone(),
        goals: maze.goals.clone(),
        bonuses: maze.bonuses.clone(),
        threats: maze
            .threat_spawns
            .iter()
            .map(|t| Threat::new((t.x as f64, t.y as f64), 0.0))
            .collect(),
        spawn_anchors: maze.threat_spawns.clone(),
        agent: maze.agent_start,
        legal: maze.legal_headings(maze.agent_start),
    };

    if show {
        let threats: Vec<_> = maze.threat_spawns.iter().map(|&t| (t, false)).collect();
        print!(
            "{}",
            maze.render(maze.agent_start, &maze.goals, &maze.bonuses, &threats)
        );
        println!();
    }

    let mut agent = PolicyAgent::new(config)?;
    let start = Instant::now();
    let (chosen, stats) = agent.decide(&observation);
    let elapsed = start.elapsed();

    match chosen {
        Some(heading) => println!("Best heading: {:?}", heading),
        None => println!("No legal action available"),
    }
    println!(
        "Converged: {} ({} sweeps, final delta {:.5}, {:.1}ms)",
        stats.converged,
        stats.sweeps,
        stats.final_delta,
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

fn run_episode(
    map: PathBuf,
    config_path: PathBuf,
    steps: Option<u64>,
    seed: Option<u64>,
    watch: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path, quiet)?;
    let maze = Maze::parse(&std::fs::read_to_string(&map)?)?;

    let seed = seed.unwrap_or_else(rand::random);
    let steps = steps.unwrap_or(config.sim.max_steps);

    if !quiet {
        println!("Using seed: {}", seed);
        println!("Starting episode");
        println!("  Grid size: {}x{}", maze.width, maze.height);
        println!("  Goals: {}", maze.goals.len());
        println!("  Threats: {}", maze.threat_spawns.len());
        println!("  Step cap: {}", steps);
        println!();
    }

    let mut episode = Episode::new(maze, config, seed)?;
    let start = Instant::now();

    if watch {
        episode.run_with_callback(steps, |ep| {
            println!("{}", ep.render());
        });
    } else {
        episode.run(steps);
    }

    let elapsed = start.elapsed();
    println!("{}", episode.stats().summary());
    if !quiet {
        println!(
            "Elapsed: {:.2}s ({:.1} steps/s)",
            elapsed.as_secs_f64(),
            episode.stats().steps as f64 / elapsed.as_secs_f64().max(1e-9)
        );
    }
    Ok(())
}

fn run_benchmark(
    width: i32,
    height: i32,
    decisions: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Running benchmark: {}x{} arena, {} decisions",
        width, height, decisions
    );
    let result = benchmark(width, height, decisions);
    println!("{}", result);
    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Default configuration written to: {:?}", output);
    Ok(())
}
