//! tilefx headless demo.
//!
//! Runs the animation layer against a scripted stand-in simulation
//! ([`tilefx::demo::DemoBoard`]) with no renderer attached:
//!
//! 1. Load [`AnimationConfig`] from an INI file (defaults if missing)
//! 2. Install the scheduler, controllers and coordinator into a fresh `World`
//! 3. Per tick: step the stand-in simulation, then run the animation schedule
//! 4. Log a one-line summary every second of simulated time and, with
//!    `--json`, print a final snapshot to stdout
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --release -- --ticks 1200 --seed 7 --json
//! ```

use bevy_ecs::prelude::*;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use tilefx::animworld::{AnimationWorld, install_animations};
use tilefx::demo::DemoBoard;
use tilefx::resources::animconfig::AnimationConfig;

/// Ticks per second of simulated time, for log pacing only.
const TICKS_PER_SECOND: u64 = 60;

/// Headless tile animation demo
#[derive(Parser)]
#[command(version, about = "Drive the tile animation layer with a scripted board")]
struct Cli {
    /// Animation config file (INI). Defaults to ./animation.ini.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Seed for the scripted board.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Board width in cells.
    #[arg(long, default_value_t = 6)]
    cols: i32,

    /// Board height in cells.
    #[arg(long, default_value_t = 12)]
    rows: i32,

    /// Print a JSON snapshot of the animation state when done.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => AnimationConfig::with_path(path),
        None => AnimationConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        warn!("{}; using default animation timings", e);
    }

    let mut world = World::new();
    install_animations(&mut world, config);
    let mut board = DemoBoard::new(&mut world, cli.cols, cli.rows, cli.seed);

    for tick in 1..=cli.ticks {
        board.step(&mut world);
        world.tick_animations();
        if tick % TICKS_PER_SECOND == 0 {
            info!("{}", world.animation_debug_info());
        }
    }

    let stats = board.stats();
    info!(
        "demo done: {} ticks, {} swaps, {} matches, {} cleared, {} falls, {} rises, {} tiles dropped in ({} on reused handles), {} handles pooled",
        stats.ticks,
        stats.swaps,
        stats.matches,
        stats.cleared,
        stats.falls,
        stats.rises,
        stats.spawned,
        stats.reused_handles,
        board.released_handles()
    );

    if cli.json {
        match world.snapshot_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
