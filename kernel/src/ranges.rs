//! Per-cell range reset and boundary detection over the sorted cell ids.
//!
//! Range buffers are atomics because, as on a device, any lane may write any
//! cell's slot. Each slot is written by at most one lane per pass.

use core::sync::atomic::{AtomicU32, Ordering};

use shared::{RangeParams, ThreadId, CELL_EMPTY};

/// Mark cell `thread_id` empty. Must run before [`update_range`] every tick.
#[inline]
pub fn reset_range(
    thread_id: ThreadId,
    cell_starts: &[AtomicU32],
    cell_ends: &[AtomicU32],
    params: &RangeParams,
) {
    let cell = thread_id.as_usize();
    if cell >= params.total_cells as usize {
        return;
    }
    cell_starts[cell].store(CELL_EMPTY, Ordering::Relaxed);
    cell_ends[cell].store(CELL_EMPTY, Ordering::Relaxed);
}

/// Record `thread_id` as a start and/or end boundary of its cell.
///
/// Only neighbouring entries are read, so lanes need no ordering between them.
#[inline]
pub fn update_range(
    thread_id: ThreadId,
    sorted_cell_ids: &[u32],
    cell_starts: &[AtomicU32],
    cell_ends: &[AtomicU32],
    params: &RangeParams,
) {
    let i = thread_id.as_usize();
    let count = params.boid_count as usize;
    if i >= count {
        return;
    }

    let cell = sorted_cell_ids[i];
    let slot = cell as usize;
    if slot >= params.total_cells as usize {
        return;
    }

    if i == 0 || sorted_cell_ids[i - 1] != cell {
        cell_starts[slot].store(i as u32, Ordering::Relaxed);
    }
    if i + 1 == count || sorted_cell_ids[i + 1] != cell {
        cell_ends[slot].store(i as u32 + 1, Ordering::Relaxed);
    }
}
