use bytemuck::{Pod, Zeroable};
use glam::{IVec3, UVec3, Vec3};

/// Uniform description of the spatial hash grid.
///
/// The world is the cube `[min_bound, max_bound]^3`, cut into `resolution` cells
/// per axis of edge `cell_size`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridParams {
    pub min_bound: f32,
    pub max_bound: f32,
    pub cell_size: f32,
    pub resolution: u32,
    pub total_cells: u32,
    pub _pad: [u32; 3],
}

impl GridParams {
    #[inline]
    pub fn inv_cell_size(&self) -> f32 {
        1.0 / self.cell_size
    }

    #[inline]
    pub fn contains(&self, pos: Vec3) -> bool {
        pos.cmpge(Vec3::splat(self.min_bound)).all() && pos.cmple(Vec3::splat(self.max_bound)).all()
    }
}

/// Integer cell coordinates of `pos`.
///
/// Precondition: `pos` lies inside the grid bounds. A position exactly on
/// `max_bound` maps to the last cell instead of one past it.
#[inline(always)]
pub fn cell_coords(pos: Vec3, grid: &GridParams) -> UVec3 {
    let scaled = ((pos - Vec3::splat(grid.min_bound)) * grid.inv_cell_size()).floor();
    let last = (grid.resolution - 1) as f32;
    scaled.clamp(Vec3::ZERO, Vec3::splat(last)).as_uvec3()
}

/// Row-major flattening: `x + y * res + z * res^2`
#[inline(always)]
pub fn linear_cell_index(coords: UVec3, resolution: u32) -> u32 {
    coords.x + coords.y * resolution + coords.z * resolution * resolution
}

/// Inverse of [`linear_cell_index`]
#[inline(always)]
pub fn cell_coords_of_index(cell: u32, resolution: u32) -> UVec3 {
    UVec3::new(
        cell % resolution,
        (cell / resolution) % resolution,
        cell / (resolution * resolution),
    )
}

/// Cell id of the cell containing `pos`
#[inline(always)]
pub fn cell_of(pos: Vec3, grid: &GridParams) -> u32 {
    linear_cell_index(cell_coords(pos, grid), grid.resolution)
}

/// Cell coordinates offset by `offset`, or `None` when that leaves the grid
#[inline(always)]
pub fn offset_coords(coords: UVec3, offset: IVec3, resolution: u32) -> Option<UVec3> {
    let shifted = coords.as_ivec3() + offset;
    let res = resolution as i32;
    if shifted.x < 0
        || shifted.y < 0
        || shifted.z < 0
        || shifted.x >= res
        || shifted.y >= res
        || shifted.z >= res
    {
        return None;
    }
    Some(shifted.as_uvec3())
}

/// Offsets for a 3x3x3 stencil around a grid cell, centre included.
pub const STENCIL_OFFSETS: [IVec3; 27] = {
    let mut offsets = [IVec3::ZERO; 27];
    let mut i = 0;
    while i < 27 {
        offsets[i] = IVec3::new(
            (i % 3) as i32 - 1,
            ((i / 3) % 3) as i32 - 1,
            (i / 9) as i32 - 1,
        );
        i += 1;
    }
    offsets
};
