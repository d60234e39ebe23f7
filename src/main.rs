//! Headless boids run: load settings, step the flock, report progress.

use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use boids_gpu_grid::{Simulation, SimulationMode, SimulationSettings};
use clap::{Parser, ValueEnum};
use tracing::info;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    /// All-pairs neighbour scan
    Cpu,
    /// Hash grid built from a bitonic sort
    Gpu,
}

impl From<Mode> for SimulationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Cpu => SimulationMode::Cpu,
            Mode::Gpu => SimulationMode::Gpu,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "boids", version, about = "Run a boids flock headless")]
struct Cli {
    /// TOML settings file; missing keys use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Number of agents.
    #[arg(long)]
    boids: Option<u32>,

    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Seed for reproducible spawns.
    #[arg(long)]
    seed: Option<u64>,

    /// Log a summary every N ticks.
    #[arg(long, default_value_t = 60)]
    report_every: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => SimulationSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SimulationSettings::default(),
    };
    if let Some(mode) = cli.mode {
        settings.mode = mode.into();
    }
    if let Some(boids) = cli.boids {
        settings.boid_count = boids;
    }
    if cli.seed.is_some() {
        settings.rng_seed = cli.seed;
    }
    settings.validate().context("invalid settings")?;

    let mut simulation =
        Simulation::new(&settings).context("failed to initialize the simulation")?;
    let dt = settings.delta_time;
    let report_every = cli.report_every.max(1);

    let mut remaining = cli.ticks;
    while remaining > 0 {
        let batch = remaining.min(report_every);
        let started = Instant::now();
        simulation
            .run(batch, dt)
            .with_context(|| format!("tick {} failed", simulation.strategy().tick()))?;
        remaining -= batch;

        let strategy = simulation.strategy();
        info!(
            tick = strategy.tick(),
            occupied_cells = ?strategy.occupied_cells(),
            mean_speed = strategy.mean_speed(),
            ms_per_tick = started.elapsed().as_secs_f64() * 1e3 / batch as f64,
            "progress"
        );
    }

    let args = simulation.strategy().draw_args();
    println!(
        "draw args: index_count={} instance_count={} start_index={} \
         base_vertex={} start_instance={}",
        args.index_count,
        args.instance_count,
        args.start_index,
        args.base_vertex,
        args.start_instance
    );
    simulation.dispose();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
