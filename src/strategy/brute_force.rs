//! All-pairs flock: no grid, every agent checks every other agent.

use glam::Vec3;
use kernel::{boundary_avoidance, integrate_agent, NeighbourAccumulator};
use rayon::prelude::*;
use shared::{FlockParams, GridParams, IndirectDrawArgs};
use tracing::{debug, info};

use super::{draw_args_for, spawn_agents, FlockingBackend};
use crate::{
    config::SimulationSettings,
    error::{CrateResult, SimError},
    params::ParameterReceiver,
};

/// Portable O(n²) flock
pub struct BruteForceFlock {
    params: FlockParams,
    /// World bounds; only the bounds are used
    bounds: GridParams,
    parameters: ParameterReceiver,
    draw_args: IndirectDrawArgs,

    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    accelerations: Vec<Vec3>,

    tick: u64,
    disposed: bool,
}

impl BruteForceFlock {
    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn accelerations(&self) -> &[Vec3] {
        &self.accelerations
    }

    /// Agents within the neighbour distance of `agent`
    pub fn neighbours_of(&self, agent: usize) -> Vec<u32> {
        let Some(&position) = self.positions.get(agent) else {
            return Vec::new();
        };
        let radius_sq = self.params.neighbour_distance_sq();
        self.positions
            .iter()
            .enumerate()
            .filter(|&(j, other)| j != agent && position.distance_squared(*other) <= radius_sq)
            .map(|(j, _)| j as u32)
            .collect()
    }
}

impl FlockingBackend for BruteForceFlock {
    fn initialize(
        settings: &SimulationSettings,
        parameters: ParameterReceiver,
    ) -> CrateResult<Self> {
        settings.validate()?;
        let bounds = *settings.grid()?.params();
        let (positions, velocities) = spawn_agents(settings);
        let count = positions.len();
        info!(
            boids = count,
            threads = rayon::current_num_threads(),
            "brute force flock initialized"
        );
        Ok(Self {
            params: settings.flock_params(),
            bounds,
            parameters,
            draw_args: draw_args_for(settings, settings.boid_count),
            positions,
            velocities,
            accelerations: vec![Vec3::ZERO; count],
            tick: 0,
            disposed: false,
        })
    }

    fn step(&mut self, dt: f32) -> CrateResult<()> {
        if self.disposed {
            return Err(SimError::Disposed);
        }
        let params = &self.params;
        let bounds = &self.bounds;
        self.positions
            .par_iter_mut()
            .zip(self.velocities.par_iter_mut())
            .zip(self.accelerations.par_iter())
            .for_each(|((position, velocity), &acceleration)| {
                integrate_agent(position, velocity, acceleration, dt, params, bounds);
            });

        if let Some(update) = self.parameters.poll() {
            update.apply_to(&mut self.params);
        }

        let params = &self.params;
        let positions = &self.positions;
        let velocities = &self.velocities;
        self.accelerations
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, acceleration)| {
                let position = positions[i];
                let velocity = velocities[i];
                let forward = velocity.normalize_or_zero();
                let mut neighbours = NeighbourAccumulator::default();
                for (j, (&other, &other_velocity)) in positions.iter().zip(velocities).enumerate() {
                    if j != i {
                        neighbours.consider(position, forward, other, other_velocity, params);
                    }
                }
                *acceleration = neighbours.steer(position, velocity, params)
                    + boundary_avoidance(position, params, bounds);
            });

        self.tick += 1;
        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.positions = Vec::new();
        self.velocities = Vec::new();
        self.accelerations = Vec::new();
        self.disposed = true;
        debug!(tick = self.tick, "brute force flock disposed");
    }

    fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    fn draw_args(&self) -> IndirectDrawArgs {
        self.draw_args
    }

    fn tick(&self) -> u64 {
        self.tick
    }
}
