#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line driver that runs a headless Lane Defence skirmish.

mod logging;
mod path;
mod scenario;
mod simulation;

use std::{path::PathBuf, time::Duration};

use anyhow::{ensure, Result};
use clap::Parser;

use crate::{path::LanePathProvider, scenario::Scenario, simulation::Simulation};

/// Runs a lane defence scenario headlessly and prints the outcome.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario TOML file; the built-in scenario runs when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of ticks to simulate
    #[arg(long, default_value_t = 1_200)]
    ticks: u32,

    /// Simulated milliseconds per tick
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Seed for the lane path jitter
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Entry point for the Lane Defence command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);
    ensure!(args.tick_ms > 0, "--tick-ms must be positive");

    let scenario = Scenario::load(args.config.as_deref())?;
    let paths = LanePathProvider::new(&scenario.lane, args.seed);
    let mut simulation = Simulation::new(scenario, paths);
    let outcome = simulation.run(args.ticks, Duration::from_millis(args.tick_ms));

    println!("{outcome}");
    Ok(())
}
