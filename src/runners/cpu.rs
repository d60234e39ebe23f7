//! CPU execution for compute kernels
//!
//! Lanes of one dispatch are spread over a rayon pool. Each pass hands rayon
//! disjoint slices (one per workgroup, or one per span of the bitonic
//! network), mirroring the no-aliasing guarantee the kernels are written
//! against.

use std::sync::atomic::AtomicU32;

use kernel::{
    compare_and_swap_elements, flock_agent, integrate_agent, local_bms, local_disperse,
    reset_range, update_range,
};
use rayon::prelude::*;
use shared::{FlockParams, GridParams, RangeParams, SortAlgorithm, SortParams, ThreadId};
use tracing::{info, trace};

use crate::{
    error::{CrateResult, SimError},
    runners::{ComputeRunner, DispatchSize, FlockBindings, IntegrateBindings},
};

/// CPU-based runner executing each dispatch on a rayon thread pool
pub struct CpuRunner {
    pool: rayon::ThreadPool,
}

impl CpuRunner {
    /// Runner with one worker per logical CPU
    pub fn new() -> CrateResult<Self> {
        Self::with_threads(num_cpus::get())
    }

    pub fn with_threads(threads: usize) -> CrateResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("boids-lane-{i}"))
            .build()?;
        info!(threads = pool.current_num_threads(), "cpu runner ready");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

fn check_len(what: &'static str, len: usize, required: usize) -> CrateResult<()> {
    if len < required {
        return Err(SimError::BufferTooSmall {
            what,
            len,
            required,
        });
    }
    Ok(())
}

/// Mirrored compare across each span of `h`: element `t` of the first half
/// against element `h - 1 - t`.
fn big_flip(keys: &mut [u32], values: &mut [u32], h: usize, lanes_per_group: usize) {
    let half = h / 2;
    keys.par_chunks_mut(h)
        .zip(values.par_chunks_mut(h))
        .for_each(|(span_keys, span_values)| {
            let (lo_keys, hi_keys) = span_keys.split_at_mut(half);
            let (lo_values, hi_values) = span_values.split_at_mut(half);
            // the reversed upper half lines up chunk for chunk with the lower one
            lo_keys
                .par_chunks_mut(lanes_per_group)
                .zip(lo_values.par_chunks_mut(lanes_per_group))
                .zip(
                    hi_keys
                        .par_rchunks_mut(lanes_per_group)
                        .zip(hi_values.par_rchunks_mut(lanes_per_group)),
                )
                .for_each(|((lk, lv), (hk, hv))| {
                    let n = lk.len();
                    for lane in 0..n {
                        compare_and_swap_elements(
                            &mut lk[lane],
                            &mut lv[lane],
                            &mut hk[n - 1 - lane],
                            &mut hv[n - 1 - lane],
                        );
                    }
                });
        });
}

/// Compare across each span of `h`: element `t` against `t + h / 2`.
fn big_disperse(keys: &mut [u32], values: &mut [u32], h: usize, lanes_per_group: usize) {
    let half = h / 2;
    keys.par_chunks_mut(h)
        .zip(values.par_chunks_mut(h))
        .for_each(|(span_keys, span_values)| {
            let (lo_keys, hi_keys) = span_keys.split_at_mut(half);
            let (lo_values, hi_values) = span_values.split_at_mut(half);
            lo_keys
                .par_chunks_mut(lanes_per_group)
                .zip(lo_values.par_chunks_mut(lanes_per_group))
                .zip(
                    hi_keys
                        .par_chunks_mut(lanes_per_group)
                        .zip(hi_values.par_chunks_mut(lanes_per_group)),
                )
                .for_each(|((lk, lv), (hk, hv))| {
                    for lane in 0..lk.len() {
                        compare_and_swap_elements(
                            &mut lk[lane],
                            &mut lv[lane],
                            &mut hk[lane],
                            &mut hv[lane],
                        );
                    }
                });
        });
}

impl ComputeRunner for CpuRunner {
    fn backend_info(
        &self,
    ) -> (
        &'static str,
        Option<&'static str>,
        Option<String>,
        Option<String>,
    ) {
        (
            "cpu",
            Some("rayon"),
            Some(format!("{} threads", self.threads())),
            None,
        )
    }

    fn dispatch_sort(
        &self,
        keys: &mut [u32],
        values: &mut [u32],
        params: SortParams,
        size: DispatchSize,
    ) -> CrateResult<()> {
        let algorithm = params
            .algorithm()
            .map_err(|e| SimError::InvalidConfig(format!("{e}: {}", params.algorithm)))?;
        let count = params.count as usize;
        let h = params.h as usize;
        check_len("keys", keys.len(), count)?;
        check_len("values", values.len(), count)?;
        if h == 0 || count % h != 0 {
            return Err(SimError::InvalidConfig(format!(
                "sort span {h} does not divide count {count}"
            )));
        }
        trace!(%algorithm, h, workgroups = size.workgroups, "sort pass");

        let keys = &mut keys[..count];
        let values = &mut values[..count];
        let lanes_per_group = (size.workgroup_size as usize).max(1);

        self.pool.install(|| match algorithm {
            SortAlgorithm::LocalBms => keys
                .par_chunks_mut(h)
                .zip(values.par_chunks_mut(h))
                .for_each(|(k, v)| local_bms(k, v, params.h)),
            SortAlgorithm::LocalDisperse => keys
                .par_chunks_mut(h)
                .zip(values.par_chunks_mut(h))
                .for_each(|(k, v)| local_disperse(k, v, params.h)),
            SortAlgorithm::BigFlip => big_flip(keys, values, h, lanes_per_group),
            SortAlgorithm::BigDisperse => big_disperse(keys, values, h, lanes_per_group),
        });
        Ok(())
    }

    fn dispatch_integrate(
        &self,
        bindings: IntegrateBindings<'_>,
        dt: f32,
        params: &FlockParams,
        grid: &GridParams,
        size: DispatchSize,
    ) -> CrateResult<()> {
        let count = params.boid_count as usize;
        check_len("positions", bindings.positions.len(), count)?;
        check_len("velocities", bindings.velocities.len(), count)?;
        check_len("accelerations", bindings.accelerations.len(), count)?;
        check_len("cell ids", bindings.cell_ids.len(), count)?;
        check_len("boid ids", bindings.boid_ids.len(), count)?;
        trace!(workgroups = size.workgroups, "integrate pass");

        let group = (size.workgroup_size as usize).max(1);
        let IntegrateBindings {
            positions,
            velocities,
            accelerations,
            cell_ids,
            boid_ids,
        } = bindings;
        self.pool.install(|| {
            positions[..count]
                .par_chunks_mut(group)
                .zip(velocities[..count].par_chunks_mut(group))
                .zip(accelerations[..count].par_chunks(group))
                .zip(cell_ids[..count].par_chunks_mut(group))
                .zip(boid_ids[..count].par_chunks_mut(group))
                .enumerate()
                .for_each(|(g, ((((xs, vs), accs), cells), ids))| {
                    for lane in 0..xs.len() {
                        let agent = g * group + lane;
                        cells[lane] = integrate_agent(
                            &mut xs[lane],
                            &mut vs[lane],
                            accs[lane],
                            dt,
                            params,
                            grid,
                        );
                        ids[lane] = agent as u32;
                    }
                });
        });
        Ok(())
    }

    fn dispatch_reset_ranges(
        &self,
        cell_starts: &[AtomicU32],
        cell_ends: &[AtomicU32],
        params: &RangeParams,
        size: DispatchSize,
    ) -> CrateResult<()> {
        let cells = params.total_cells as usize;
        check_len("cell starts", cell_starts.len(), cells)?;
        check_len("cell ends", cell_ends.len(), cells)?;
        trace!(workgroups = size.workgroups, "reset ranges pass");

        self.pool.install(|| {
            (0..size.lanes() as u32)
                .into_par_iter()
                .with_min_len(size.workgroup_size as usize)
                .for_each(|t| reset_range(ThreadId::new(t), cell_starts, cell_ends, params));
        });
        Ok(())
    }

    fn dispatch_update_ranges(
        &self,
        sorted_cell_ids: &[u32],
        cell_starts: &[AtomicU32],
        cell_ends: &[AtomicU32],
        params: &RangeParams,
        size: DispatchSize,
    ) -> CrateResult<()> {
        let cells = params.total_cells as usize;
        check_len("sorted cell ids", sorted_cell_ids.len(), params.boid_count as usize)?;
        check_len("cell starts", cell_starts.len(), cells)?;
        check_len("cell ends", cell_ends.len(), cells)?;
        trace!(workgroups = size.workgroups, "update ranges pass");

        self.pool.install(|| {
            (0..size.lanes() as u32)
                .into_par_iter()
                .with_min_len(size.workgroup_size as usize)
                .for_each(|t| {
                    update_range(
                        ThreadId::new(t),
                        sorted_cell_ids,
                        cell_starts,
                        cell_ends,
                        params,
                    )
                });
        });
        Ok(())
    }

    fn dispatch_flock(
        &self,
        bindings: FlockBindings<'_>,
        params: &FlockParams,
        grid: &GridParams,
        size: DispatchSize,
    ) -> CrateResult<()> {
        let count = params.boid_count as usize;
        let cells = grid.total_cells as usize;
        check_len("positions", bindings.positions.len(), count)?;
        check_len("velocities", bindings.velocities.len(), count)?;
        check_len("accelerations", bindings.accelerations.len(), count)?;
        check_len("sorted boid ids", bindings.sorted_boid_ids.len(), count)?;
        check_len("cell starts", bindings.cell_starts.len(), cells)?;
        check_len("cell ends", bindings.cell_ends.len(), cells)?;
        trace!(workgroups = size.workgroups, "flock pass");

        let group = (size.workgroup_size as usize).max(1);
        let FlockBindings {
            positions,
            velocities,
            accelerations,
            sorted_boid_ids,
            cell_starts,
            cell_ends,
        } = bindings;
        self.pool.install(|| {
            accelerations[..count]
                .par_chunks_mut(group)
                .enumerate()
                .for_each(|(g, accs)| {
                    for (lane, acc) in accs.iter_mut().enumerate() {
                        *acc = flock_agent(
                            ThreadId::new((g * group + lane) as u32),
                            positions,
                            velocities,
                            sorted_boid_ids,
                            cell_starts,
                            cell_ends,
                            grid,
                            params,
                        );
                    }
                });
        });
        Ok(())
    }
}
