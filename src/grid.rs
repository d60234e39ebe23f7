//! Uniform spatial hash grid over the cubic world.

use glam::{UVec3, Vec3};
use shared::{
    grid::{self, cell_coords_of_index, linear_cell_index, offset_coords, STENCIL_OFFSETS},
    GridParams, KEY_PADDING,
};

use crate::error::{CrateResult, SimError};

/// Cell id inside `[0, total_cells)`
pub type CellId = u32;

/// Immutable grid configuration, fixed when the simulation starts.
///
/// Cell size is twice the neighbour search radius, so every agent within that
/// radius of a position lies in its cell or one of the 26 around it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridDescriptor {
    params: GridParams,
}

impl GridDescriptor {
    /// Grid over `[-extent/2, extent/2]^3` for a neighbour search radius.
    pub fn new(world_extent: f32, neighbour_distance: f32) -> CrateResult<Self> {
        if !world_extent.is_finite() || world_extent <= 0.0 {
            return Err(SimError::DegenerateGrid(format!(
                "world extent must be positive, got {world_extent}"
            )));
        }
        if !neighbour_distance.is_finite() || neighbour_distance <= 0.0 {
            return Err(SimError::DegenerateGrid(format!(
                "neighbour distance must be positive, got {neighbour_distance}"
            )));
        }

        let cell_size = 2.0 * neighbour_distance;
        let resolution = (world_extent / cell_size).ceil() as u64;
        let total_cells = resolution.checked_pow(3).unwrap_or(u64::MAX);
        if total_cells == 0 {
            return Err(SimError::DegenerateGrid(format!(
                "extent {world_extent} with cell size {cell_size} has no cells"
            )));
        }
        // cell ids must stay below the padding key
        if total_cells >= KEY_PADDING as u64 {
            return Err(SimError::CapacityExceeded {
                what: "grid cell count",
                requested: total_cells,
                capacity: KEY_PADDING as u64 - 1,
            });
        }

        Ok(Self {
            params: GridParams {
                min_bound: -world_extent * 0.5,
                max_bound: world_extent * 0.5,
                cell_size,
                resolution: resolution as u32,
                total_cells: total_cells as u32,
                _pad: [0; 3],
            },
        })
    }

    #[inline]
    pub fn params(&self) -> &GridParams {
        &self.params
    }

    pub fn min_bound(&self) -> f32 {
        self.params.min_bound
    }

    pub fn max_bound(&self) -> f32 {
        self.params.max_bound
    }

    pub fn cell_size(&self) -> f32 {
        self.params.cell_size
    }

    /// Cells per axis
    pub fn resolution(&self) -> u32 {
        self.params.resolution
    }

    pub fn total_cells(&self) -> u32 {
        self.params.total_cells
    }

    pub fn contains(&self, pos: Vec3) -> bool {
        self.params.contains(pos)
    }

    /// Integer cell coordinates. Precondition: `self.contains(pos)`.
    pub fn cell_coords(&self, pos: Vec3) -> UVec3 {
        debug_assert!(self.contains(pos), "{pos} is outside the grid");
        grid::cell_coords(pos, &self.params)
    }

    /// Cell id of `pos`. Precondition: `self.contains(pos)`.
    pub fn cell_of(&self, pos: Vec3) -> CellId {
        debug_assert!(self.contains(pos), "{pos} is outside the grid");
        grid::cell_of(pos, &self.params)
    }

    /// Cell id of `pos`, or `None` when it violates the in-bounds precondition
    pub fn try_cell_of(&self, pos: Vec3) -> Option<CellId> {
        self.contains(pos).then(|| grid::cell_of(pos, &self.params))
    }

    pub fn cell_center(&self, cell: CellId) -> Vec3 {
        let coords = cell_coords_of_index(cell, self.params.resolution);
        Vec3::splat(self.params.min_bound) + (coords.as_vec3() + 0.5) * self.params.cell_size
    }

    /// `cell` followed by every in-grid cell among its 26 axis neighbours
    pub fn neighbour_cells(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        let res = self.params.resolution;
        let home = cell_coords_of_index(cell, res);
        // centre first, then the rest of the stencil
        std::iter::once(cell).chain(
            STENCIL_OFFSETS
                .iter()
                .filter(|offset| **offset != glam::IVec3::ZERO)
                .filter_map(move |&offset| offset_coords(home, offset, res))
                .map(move |coords| linear_cell_index(coords, res)),
        )
    }
}
