//! Ember Engine demo entry point.
//!
//! A 2D stage/collision engine written in Rust:
//! - sprites with convex collision polygons and cached world snapshots
//! - a uniform broad-phase grid plus SAT narrow phase
//! - tile-layer collision with per-tile polygon overrides
//! - a per-frame stage state machine with deferred removal
//!
//! This executable runs a headless simulation: bouncing boxes inside a
//! tile-map arena, driven by a manual frame clock. Run with
//! `RUST_LOG=debug` to watch the bump events.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --steps 600 --count 8
//! ```

mod canvas;
mod collision;
mod components;
mod config;
mod engine;
mod error;
mod events;
mod game;
mod math;
mod sprites;
mod stage;
mod tiles;

use clap::Parser;
use std::path::PathBuf;

use crate::canvas::NullCanvas;
use crate::config::EngineConfig;
use crate::engine::{Engine, ManualClock};

/// Ember Engine 2D
#[derive(Parser)]
#[command(version, about = "Headless demo of the Ember 2D stage/collision engine")]
struct Cli {
    /// Number of frames to simulate at 60 fps.
    #[arg(long, default_value_t = 600)]
    steps: u32,

    /// Number of bouncing sprites to spawn.
    #[arg(long, default_value_t = 8)]
    count: u32,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Path to an INI config file (defaults to ./config.ini when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::with_path(path.clone()),
        None => EngineConfig::new(),
    };
    config.load_from_file().ok(); // ignore errors, use defaults

    let mut engine = Engine::new(config);
    game::register_scenes(&mut engine);
    engine
        .stage_scene("arena", None, None)
        .expect("demo scene is registered");

    let mut rng = match cli.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    if let Some(stage) = engine.stage_mut(0) {
        game::spawn_bouncers(stage, cli.count, &mut rng);
    }

    let mut clock = ManualClock::fixed(cli.steps, 1.0 / 60.0);
    let mut canvas = NullCanvas;
    engine.game_loop(&mut clock, &mut canvas);

    if let Some(stage) = engine.stage(0) {
        game::summarize(stage);
    }
}
