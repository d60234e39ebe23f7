//! Simulation settings, loaded once at startup and passed by reference.

use std::path::Path;

use serde::{Deserialize, Serialize};
use shared::{FlockParams, SORT_LOCAL_SIZE, WORKGROUP_SIZE};

use crate::{
    error::{CrateResult, SimError},
    grid::GridDescriptor,
    params::DynamicParameters,
    sorter::MAX_SORT_LOCAL_SIZE,
};

/// Which flocking pipeline to run
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// All-pairs neighbour scan
    Cpu,
    /// Hash grid + bitonic sort dispatch pipeline
    #[default]
    Gpu,
}

/// Dispatch granularity
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Lanes per workgroup for per-agent and per-cell passes
    pub workgroup_size: u32,
    /// Lanes per workgroup for the local sort passes
    pub sort_local_size: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            workgroup_size: WORKGROUP_SIZE,
            sort_local_size: SORT_LOCAL_SIZE,
        }
    }
}

/// Buffer capacities the simulation may allocate up to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_boids: u32,
    pub max_cells: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_boids: 1 << 20,
            max_cells: 1 << 24,
        }
    }
}

/// Mesh numbers echoed into the indirect draw arguments
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshInfo {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: u32,
}

impl Default for MeshInfo {
    fn default() -> Self {
        // a unit cube
        Self {
            index_count: 36,
            start_index: 0,
            base_vertex: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub mode: SimulationMode,
    pub boid_count: u32,
    pub spawn_radius: f32,
    /// Edge length of the cubic world, centred on the origin
    pub grid_resolution: f32,

    pub initial_speed: f32,
    pub separation_radius: f32,
    pub max_speed: f32,
    pub neighbour_distance: f32,
    pub avoidance_radius: f32,
    /// Degrees, in `[0, 360]`
    pub field_of_view: f32,

    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub avoidance_weight: f32,

    pub delta_time: f32,
    /// Optional RNG seed for reproducible spawns.
    pub rng_seed: Option<u64>,

    pub dispatch: DispatchSettings,
    pub limits: Limits,
    pub mesh: MeshInfo,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            mode: SimulationMode::default(),
            boid_count: 100,
            spawn_radius: 10.0,
            grid_resolution: 54.0,
            initial_speed: 2.0,
            separation_radius: 1.0,
            max_speed: 5.0,
            neighbour_distance: 3.0,
            avoidance_radius: 4.0,
            field_of_view: 120.0,
            separation_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            avoidance_weight: 1.0,
            delta_time: 1.0 / 60.0,
            rng_seed: None,
            dispatch: DispatchSettings::default(),
            limits: Limits::default(),
            mesh: MeshInfo::default(),
        }
    }
}

impl SimulationSettings {
    pub fn from_toml_str(source: &str) -> CrateResult<Self> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> CrateResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Grid implied by the world extent and neighbour distance
    pub fn grid(&self) -> CrateResult<GridDescriptor> {
        GridDescriptor::new(self.grid_resolution, self.neighbour_distance)
    }

    /// Check everything that would make the pipeline unable to start.
    pub fn validate(&self) -> CrateResult<()> {
        if self.boid_count == 0 {
            return Err(SimError::InvalidConfig("boid_count must be at least 1".into()));
        }
        if self.boid_count > self.limits.max_boids {
            return Err(SimError::CapacityExceeded {
                what: "boid count",
                requested: self.boid_count as u64,
                capacity: self.limits.max_boids as u64,
            });
        }
        // the padded sort length must stay addressable as u32
        if self.boid_count > (1 << 31) {
            return Err(SimError::CapacityExceeded {
                what: "boid count",
                requested: self.boid_count as u64,
                capacity: 1 << 31,
            });
        }

        let grid = self.grid()?;
        if grid.total_cells() > self.limits.max_cells {
            return Err(SimError::CapacityExceeded {
                what: "grid cell count",
                requested: grid.total_cells() as u64,
                capacity: self.limits.max_cells as u64,
            });
        }

        if self.dispatch.workgroup_size == 0 {
            return Err(SimError::InvalidConfig("workgroup_size must be non-zero".into()));
        }
        let sort_local_size = self.dispatch.sort_local_size;
        if !sort_local_size.is_power_of_two() || sort_local_size > MAX_SORT_LOCAL_SIZE {
            return Err(SimError::InvalidConfig(format!(
                "sort_local_size must be a power of two up to {MAX_SORT_LOCAL_SIZE}, \
                 got {sort_local_size}"
            )));
        }

        if !self.spawn_radius.is_finite()
            || self.spawn_radius < 0.0
            || self.spawn_radius > grid.max_bound()
        {
            return Err(SimError::InvalidConfig(format!(
                "spawn_radius {} must fit inside the world half-extent {}",
                self.spawn_radius,
                grid.max_bound()
            )));
        }
        if !(0.0..=360.0).contains(&self.field_of_view) {
            return Err(SimError::InvalidConfig(format!(
                "field_of_view must be within [0, 360] degrees, got {}",
                self.field_of_view
            )));
        }
        for (name, value) in [
            ("max_speed", self.max_speed),
            ("initial_speed", self.initial_speed),
            ("delta_time", self.delta_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        self.dynamic_parameters().validate()
    }

    pub fn dynamic_parameters(&self) -> DynamicParameters {
        DynamicParameters {
            separation_weight: self.separation_weight,
            alignment_weight: self.alignment_weight,
            cohesion_weight: self.cohesion_weight,
            avoidance_weight: self.avoidance_weight,
            separation_radius: self.separation_radius,
            avoidance_radius: self.avoidance_radius,
        }
    }

    /// Kernel uniforms for the current settings
    pub fn flock_params(&self) -> FlockParams {
        let mut params = FlockParams {
            boid_count: self.boid_count,
            neighbour_distance: self.neighbour_distance,
            max_speed: self.max_speed,
            cos_half_fov: (self.field_of_view * 0.5).to_radians().cos(),
            separation_weight: 0.0,
            alignment_weight: 0.0,
            cohesion_weight: 0.0,
            avoidance_weight: 0.0,
            separation_radius: 0.0,
            avoidance_radius: 0.0,
            _pad: [0; 2],
        };
        self.dynamic_parameters().apply_to(&mut params);
        params
    }
}
