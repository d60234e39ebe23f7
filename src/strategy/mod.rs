//! Flocking strategies and the simulation that drives one of them.

mod brute_force;
mod grid;

use glam::Vec3;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use shared::IndirectDrawArgs;
use tracing::info;

use crate::{
    config::{SimulationMode, SimulationSettings},
    error::CrateResult,
    params::{parameter_channel, ParameterPublisher, ParameterReceiver},
};

pub use self::{brute_force::BruteForceFlock, grid::GridFlock};

/// Lifecycle shared by every flocking pipeline
pub trait FlockingBackend: Sized {
    fn initialize(
        settings: &SimulationSettings,
        parameters: ParameterReceiver,
    ) -> CrateResult<Self>;

    /// Advance every agent by `dt`
    fn step(&mut self, dt: f32) -> CrateResult<()>;

    /// Release the agent buffers; later steps fail with `Disposed`
    fn dispose(&mut self);

    fn positions(&self) -> &[Vec3];
    fn velocities(&self) -> &[Vec3];
    fn draw_args(&self) -> IndirectDrawArgs;
    /// Ticks completed since initialization
    fn tick(&self) -> u64;
}

/// The pipeline picked once at startup
pub enum FlockingStrategy {
    Cpu(BruteForceFlock),
    Gpu(GridFlock),
}

macro_rules! with_backend {
    ($strategy:expr, $backend:ident => $body:expr) => {
        match $strategy {
            FlockingStrategy::Cpu($backend) => $body,
            FlockingStrategy::Gpu($backend) => $body,
        }
    };
}

impl FlockingStrategy {
    pub fn initialize(
        settings: &SimulationSettings,
        parameters: ParameterReceiver,
    ) -> CrateResult<Self> {
        Ok(match settings.mode {
            SimulationMode::Cpu => Self::Cpu(BruteForceFlock::initialize(settings, parameters)?),
            SimulationMode::Gpu => Self::Gpu(GridFlock::initialize(settings, parameters)?),
        })
    }

    pub fn mode(&self) -> SimulationMode {
        match self {
            Self::Cpu(_) => SimulationMode::Cpu,
            Self::Gpu(_) => SimulationMode::Gpu,
        }
    }

    pub fn step(&mut self, dt: f32) -> CrateResult<()> {
        with_backend!(self, backend => backend.step(dt))
    }

    pub fn dispose(&mut self) {
        with_backend!(self, backend => backend.dispose())
    }

    pub fn positions(&self) -> &[Vec3] {
        with_backend!(self, backend => backend.positions())
    }

    pub fn velocities(&self) -> &[Vec3] {
        with_backend!(self, backend => backend.velocities())
    }

    pub fn draw_args(&self) -> IndirectDrawArgs {
        with_backend!(self, backend => backend.draw_args())
    }

    pub fn tick(&self) -> u64 {
        with_backend!(self, backend => backend.tick())
    }

    /// Non-empty grid cells; only the grid pipeline keeps them
    pub fn occupied_cells(&self) -> Option<usize> {
        match self {
            Self::Cpu(_) => None,
            Self::Gpu(flock) => Some(flock.occupied_cells()),
        }
    }

    pub fn mean_speed(&self) -> f32 {
        let velocities = self.velocities();
        if velocities.is_empty() {
            return 0.0;
        }
        velocities.iter().map(|v| v.length()).sum::<f32>() / velocities.len() as f32
    }
}

/// A running flock plus the handle used to retune it
pub struct Simulation {
    strategy: FlockingStrategy,
    publisher: ParameterPublisher,
}

impl Simulation {
    pub fn new(settings: &SimulationSettings) -> CrateResult<Self> {
        settings.validate()?;
        let (publisher, receiver) = parameter_channel(settings.dynamic_parameters());
        let strategy = FlockingStrategy::initialize(settings, receiver)?;
        info!(mode = ?strategy.mode(), boids = settings.boid_count, "simulation initialized");
        Ok(Self {
            strategy,
            publisher,
        })
    }

    /// Handle for publishing parameter changes from any thread
    pub fn publisher(&self) -> ParameterPublisher {
        self.publisher.clone()
    }

    pub fn strategy(&self) -> &FlockingStrategy {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut FlockingStrategy {
        &mut self.strategy
    }

    pub fn step(&mut self, dt: f32) -> CrateResult<()> {
        self.strategy.step(dt)
    }

    /// Run `ticks` steps of `dt`
    pub fn run(&mut self, ticks: u64, dt: f32) -> CrateResult<()> {
        match &mut self.strategy {
            FlockingStrategy::Cpu(flock) => run_ticks(flock, ticks, dt),
            FlockingStrategy::Gpu(flock) => run_ticks(flock, ticks, dt),
        }
    }

    pub fn dispose(&mut self) {
        self.strategy.dispose();
    }
}

fn run_ticks<B: FlockingBackend>(backend: &mut B, ticks: u64, dt: f32) -> CrateResult<()> {
    for _ in 0..ticks {
        backend.step(dt)?;
    }
    Ok(())
}

fn draw_args_for(settings: &SimulationSettings, instance_count: u32) -> IndirectDrawArgs {
    IndirectDrawArgs {
        index_count: settings.mesh.index_count,
        instance_count,
        start_index: settings.mesh.start_index,
        base_vertex: settings.mesh.base_vertex,
        start_instance: 0,
    }
}

/// Initial positions inside the spawn sphere and velocities of
/// `initial_speed` in random directions
fn spawn_agents(settings: &SimulationSettings) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut rng = match settings.rng_seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let count = settings.boid_count as usize;
    let mut positions = Vec::with_capacity(count);
    let mut velocities = Vec::with_capacity(count);
    for _ in 0..count {
        positions.push(random_in_unit_sphere(&mut rng) * settings.spawn_radius);
        velocities.push(random_unit_vector(&mut rng) * settings.initial_speed);
    }
    (positions, velocities)
}

fn random_in_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if v.length_squared() <= 1.0 {
            return v;
        }
    }
}

fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = random_in_unit_sphere(rng);
        if v.length_squared() > 1.0e-6 {
            return v.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: SimulationMode) -> SimulationSettings {
        SimulationSettings {
            mode,
            boid_count: 64,
            rng_seed: Some(11),
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn spawns_inside_the_sphere_at_initial_speed() {
        let settings = settings(SimulationMode::Gpu);
        let (positions, velocities) = spawn_agents(&settings);
        assert_eq!(positions.len(), 64);
        assert!(positions
            .iter()
            .all(|p| p.length() <= settings.spawn_radius + 1e-4));
        assert!(velocities
            .iter()
            .all(|v| (v.length() - settings.initial_speed).abs() < 1e-4));
    }

    #[test]
    fn seeded_spawns_repeat() {
        let settings = settings(SimulationMode::Cpu);
        assert_eq!(spawn_agents(&settings), spawn_agents(&settings));
    }

    #[test]
    fn mode_selects_the_variant() {
        let sim = Simulation::new(&settings(SimulationMode::Cpu)).unwrap();
        assert_eq!(sim.strategy().mode(), SimulationMode::Cpu);
        assert_eq!(sim.strategy().occupied_cells(), None);

        let sim = Simulation::new(&settings(SimulationMode::Gpu)).unwrap();
        assert_eq!(sim.strategy().mode(), SimulationMode::Gpu);
        assert!(sim.strategy().occupied_cells().is_some());
    }

    #[test]
    fn run_counts_ticks() {
        let mut sim = Simulation::new(&settings(SimulationMode::Gpu)).unwrap();
        sim.run(3, 1.0 / 60.0).unwrap();
        sim.step(1.0 / 60.0).unwrap();
        assert_eq!(sim.strategy().tick(), 4);
    }

    #[test]
    fn stepping_after_dispose_fails() {
        let mut sim = Simulation::new(&settings(SimulationMode::Cpu)).unwrap();
        sim.dispose();
        assert!(sim.strategy().positions().is_empty());
        assert!(matches!(
            sim.step(0.1),
            Err(crate::error::SimError::Disposed)
        ));
    }
}
