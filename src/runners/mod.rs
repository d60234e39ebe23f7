//! Runner implementations for different compute backends

pub mod cpu;

use std::sync::atomic::AtomicU32;

use glam::Vec3;
use shared::{num_workgroups_1d, FlockParams, GridParams, RangeParams, SortParams};

use crate::{error::CrateResult, sorter::BitonicSorter};

pub use self::cpu::CpuRunner;

/// Workgroup count and lanes per workgroup of one dispatch
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DispatchSize {
    pub workgroups: u32,
    pub workgroup_size: u32,
}

impl DispatchSize {
    /// Enough workgroups of `workgroup_size` lanes to cover `num_elements`
    pub fn for_elements(num_elements: u32, workgroup_size: u32) -> Self {
        Self {
            workgroups: num_workgroups_1d(num_elements, workgroup_size)[0],
            workgroup_size,
        }
    }

    pub fn lanes(&self) -> u64 {
        self.workgroups as u64 * self.workgroup_size as u64
    }
}

/// Buffers bound to the integrate pass
pub struct IntegrateBindings<'a> {
    pub positions: &'a mut [Vec3],
    pub velocities: &'a mut [Vec3],
    pub accelerations: &'a [Vec3],
    /// Unsorted keys; lane `i` writes the cell of agent `i`
    pub cell_ids: &'a mut [u32],
    /// Unsorted values; lane `i` writes `i`
    pub boid_ids: &'a mut [u32],
}

/// Buffers bound to the flock pass
pub struct FlockBindings<'a> {
    pub positions: &'a [Vec3],
    pub velocities: &'a [Vec3],
    pub accelerations: &'a mut [Vec3],
    pub sorted_boid_ids: &'a [u32],
    pub cell_starts: &'a [AtomicU32],
    pub cell_ends: &'a [AtomicU32],
}

/// An execution backend for the pipeline's kernels.
///
/// Every `dispatch_*` returns only after all lanes of that dispatch have
/// finished, so consecutive calls are separated by a full barrier.
pub trait ComputeRunner {
    /// (backend, api, adapter, driver)
    fn backend_info(
        &self,
    ) -> (
        &'static str,
        Option<&'static str>,
        Option<String>,
        Option<String>,
    );

    /// One pass of the bitonic network over `keys[..params.count]`
    fn dispatch_sort(
        &self,
        keys: &mut [u32],
        values: &mut [u32],
        params: SortParams,
        size: DispatchSize,
    ) -> CrateResult<()>;

    fn dispatch_integrate(
        &self,
        bindings: IntegrateBindings<'_>,
        dt: f32,
        params: &FlockParams,
        grid: &GridParams,
        size: DispatchSize,
    ) -> CrateResult<()>;

    fn dispatch_reset_ranges(
        &self,
        cell_starts: &[AtomicU32],
        cell_ends: &[AtomicU32],
        params: &RangeParams,
        size: DispatchSize,
    ) -> CrateResult<()>;

    fn dispatch_update_ranges(
        &self,
        sorted_cell_ids: &[u32],
        cell_starts: &[AtomicU32],
        cell_ends: &[AtomicU32],
        params: &RangeParams,
        size: DispatchSize,
    ) -> CrateResult<()>;

    fn dispatch_flock(
        &self,
        bindings: FlockBindings<'_>,
        params: &FlockParams,
        grid: &GridParams,
        size: DispatchSize,
    ) -> CrateResult<()>;

    /// Sort `keys[..count]` ascending, carrying `values` along, with the
    /// default local size.
    fn sort(&self, keys: &mut [u32], values: &mut [u32], count: usize) -> CrateResult<()> {
        BitonicSorter::default().dispatch(self, keys, values, count)
    }
}

/// Check whether keys are sorted ascending
pub fn verify_sorted(keys: &[u32]) -> bool {
    keys.windows(2).all(|w| w[0] <= w[1])
}
