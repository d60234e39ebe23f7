//! Hash grid pipeline: integrate, sort by cell, rebuild ranges, flock.

use std::ops::Range;

use glam::Vec3;
use kernel::for_each_candidate;
use shared::{FlockParams, IndirectDrawArgs, KEY_PADDING};
use tracing::{debug, info};

use super::{draw_args_for, spawn_agents, FlockingBackend};
use crate::{
    config::SimulationSettings,
    error::{CrateResult, SimError},
    grid::{CellId, GridDescriptor},
    params::ParameterReceiver,
    ranges::CellRanges,
    runners::{ComputeRunner, CpuRunner, DispatchSize, FlockBindings, IntegrateBindings},
    sorter::BitonicSorter,
};

/// Grid-accelerated flock.
///
/// Key and value buffers are padded to the next power of two; padding slots
/// keep [`KEY_PADDING`] so they sort behind every real cell id.
pub struct GridFlock {
    runner: CpuRunner,
    sorter: BitonicSorter,
    grid: GridDescriptor,
    params: FlockParams,
    parameters: ParameterReceiver,
    workgroup_size: u32,
    draw_args: IndirectDrawArgs,

    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    accelerations: Vec<Vec3>,
    cell_ids: Vec<u32>,
    boid_ids: Vec<u32>,
    ranges: CellRanges,

    tick: u64,
    disposed: bool,
}

impl GridFlock {
    fn count(&self) -> usize {
        self.params.boid_count as usize
    }

    fn agent_dispatch(&self) -> DispatchSize {
        DispatchSize::for_elements(self.params.boid_count, self.workgroup_size)
    }

    /// Sort the current keys and rebuild the cell ranges from them
    fn index(&mut self) -> CrateResult<()> {
        let padded = self.cell_ids.len();
        self.sorter
            .dispatch(&self.runner, &mut self.cell_ids, &mut self.boid_ids, padded)?;
        self.ranges.rebuild(&self.runner, &self.cell_ids, self.count())
    }

    pub fn grid(&self) -> &GridDescriptor {
        &self.grid
    }

    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn accelerations(&self) -> &[Vec3] {
        &self.accelerations
    }

    /// Cell ids in ascending order, padding included
    pub fn sorted_cell_ids(&self) -> &[u32] {
        &self.cell_ids
    }

    /// Agent ids in the order of [`Self::sorted_cell_ids`]
    pub fn sorted_boid_ids(&self) -> &[u32] {
        &self.boid_ids
    }

    pub fn cell_range(&self, cell: CellId) -> Option<Range<usize>> {
        self.ranges.range(cell)
    }

    pub fn occupied_cells(&self) -> usize {
        self.ranges.occupied_cells()
    }

    /// Agents within the neighbour distance of `agent`, found through the
    /// grid as of the last completed step.
    pub fn neighbours_of(&self, agent: usize) -> Vec<u32> {
        let Some(&position) = self.positions.get(agent) else {
            return Vec::new();
        };
        let radius_sq = self.params.neighbour_distance_sq();
        let mut found = Vec::new();
        for_each_candidate(
            position,
            self.grid.params(),
            &self.boid_ids,
            self.ranges.starts(),
            self.ranges.ends(),
            |other| {
                let j = other as usize;
                if j != agent && position.distance_squared(self.positions[j]) <= radius_sq {
                    found.push(other);
                }
            },
        );
        found
    }
}

impl FlockingBackend for GridFlock {
    fn initialize(
        settings: &SimulationSettings,
        parameters: ParameterReceiver,
    ) -> CrateResult<Self> {
        settings.validate()?;
        let grid = settings.grid()?;
        let sorter = BitonicSorter::new(settings.dispatch.sort_local_size)?;
        let runner = CpuRunner::new()?;
        let count = settings.boid_count as usize;
        let padded = count.next_power_of_two();

        let (positions, velocities) = spawn_agents(settings);
        let mut cell_ids = vec![KEY_PADDING; padded];
        for (cell, &position) in cell_ids.iter_mut().zip(&positions) {
            *cell = grid.try_cell_of(position).ok_or_else(|| {
                SimError::InvalidConfig(format!("agent spawned outside the grid at {position}"))
            })?;
        }

        let (backend, api, adapter, _) = runner.backend_info();
        info!(
            backend,
            api = ?api,
            adapter = ?adapter,
            resolution = grid.resolution(),
            total_cells = grid.total_cells(),
            cell_size = grid.cell_size(),
            boids = count,
            sort_capacity = padded,
            "grid flock initialized"
        );

        let mut flock = Self {
            runner,
            sorter,
            grid,
            params: settings.flock_params(),
            parameters,
            workgroup_size: settings.dispatch.workgroup_size,
            draw_args: draw_args_for(settings, settings.boid_count),
            positions,
            velocities,
            accelerations: vec![Vec3::ZERO; count],
            cell_ids,
            boid_ids: (0..padded as u32).collect(),
            ranges: CellRanges::with_workgroup_size(
                grid.total_cells(),
                settings.dispatch.workgroup_size,
            ),
            tick: 0,
            disposed: false,
        };
        flock.index()?;
        Ok(flock)
    }

    fn step(&mut self, dt: f32) -> CrateResult<()> {
        if self.disposed {
            return Err(SimError::Disposed);
        }
        let count = self.count();
        let size = self.agent_dispatch();

        self.runner.dispatch_integrate(
            IntegrateBindings {
                positions: &mut self.positions,
                velocities: &mut self.velocities,
                accelerations: &self.accelerations,
                cell_ids: &mut self.cell_ids[..count],
                boid_ids: &mut self.boid_ids[..count],
            },
            dt,
            &self.params,
            self.grid.params(),
            size,
        )?;

        self.index()?;

        if let Some(update) = self.parameters.poll() {
            update.apply_to(&mut self.params);
        }

        self.runner.dispatch_flock(
            FlockBindings {
                positions: &self.positions,
                velocities: &self.velocities,
                accelerations: &mut self.accelerations,
                sorted_boid_ids: &self.boid_ids,
                cell_starts: self.ranges.starts(),
                cell_ends: self.ranges.ends(),
            },
            &self.params,
            self.grid.params(),
            size,
        )?;

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
        self.cell_ids = Vec::new();
        self.boid_ids = Vec::new();
        self.ranges = CellRanges::new(0);
        self.disposed = true;
        debug!(tick = self.tick, "grid flock disposed");
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
