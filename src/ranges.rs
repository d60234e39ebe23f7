//! Per-cell `[start, end)` ranges into the sorted agent order.

use std::{
    ops::Range,
    sync::atomic::{AtomicU32, Ordering},
};

use shared::{RangeParams, CELL_EMPTY, WORKGROUP_SIZE};

use crate::{
    error::{CrateResult, SimError},
    grid::CellId,
    runners::{ComputeRunner, DispatchSize},
};

/// Start and end slot of every cell, rebuilt once per tick after the sort.
///
/// Empty cells hold [`CELL_EMPTY`] in both slots.
#[derive(Debug)]
pub struct CellRanges {
    starts: Box<[AtomicU32]>,
    ends: Box<[AtomicU32]>,
    workgroup_size: u32,
}

fn empty_slots(total_cells: u32) -> Box<[AtomicU32]> {
    (0..total_cells).map(|_| AtomicU32::new(CELL_EMPTY)).collect()
}

impl CellRanges {
    pub fn new(total_cells: u32) -> Self {
        Self::with_workgroup_size(total_cells, WORKGROUP_SIZE)
    }

    pub fn with_workgroup_size(total_cells: u32, workgroup_size: u32) -> Self {
        Self {
            starts: empty_slots(total_cells),
            ends: empty_slots(total_cells),
            workgroup_size: workgroup_size.max(1),
        }
    }

    pub fn total_cells(&self) -> u32 {
        self.starts.len() as u32
    }

    pub fn starts(&self) -> &[AtomicU32] {
        &self.starts
    }

    pub fn ends(&self) -> &[AtomicU32] {
        &self.ends
    }

    /// Reset every cell, then record the boundaries of each run of equal ids
    /// in `sorted_cell_ids[..count]`.
    pub fn rebuild<R: ComputeRunner + ?Sized>(
        &self,
        runner: &R,
        sorted_cell_ids: &[u32],
        count: usize,
    ) -> CrateResult<()> {
        if sorted_cell_ids.len() < count {
            return Err(SimError::BufferTooSmall {
                what: "sorted cell ids",
                len: sorted_cell_ids.len(),
                required: count,
            });
        }
        let params = RangeParams {
            boid_count: count as u32,
            total_cells: self.total_cells(),
        };

        runner.dispatch_reset_ranges(
            &self.starts,
            &self.ends,
            &params,
            DispatchSize::for_elements(params.total_cells, self.workgroup_size),
        )?;
        runner.dispatch_update_ranges(
            sorted_cell_ids,
            &self.starts,
            &self.ends,
            &params,
            DispatchSize::for_elements(params.boid_count, self.workgroup_size),
        )
    }

    /// Slots of the sorted order that belong to `cell`, `None` when it is
    /// empty or out of range.
    pub fn range(&self, cell: CellId) -> Option<Range<usize>> {
        let slot = cell as usize;
        let start = self.starts.get(slot)?.load(Ordering::Relaxed);
        if start == CELL_EMPTY {
            return None;
        }
        let end = self.ends[slot].load(Ordering::Relaxed);
        Some(start as usize..end as usize)
    }

    /// Number of cells holding at least one agent
    pub fn occupied_cells(&self) -> usize {
        self.starts
            .iter()
            .filter(|start| start.load(Ordering::Relaxed) != CELL_EMPTY)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::CpuRunner;

    #[test]
    fn runs_of_equal_ids_become_ranges() {
        let runner = CpuRunner::with_threads(2).unwrap();
        let ranges = CellRanges::with_workgroup_size(8, 4);
        let sorted = [1u32, 1, 3, 3, 3, 7];

        ranges.rebuild(&runner, &sorted, sorted.len()).unwrap();
        assert_eq!(ranges.range(1), Some(0..2));
        assert_eq!(ranges.range(3), Some(2..5));
        assert_eq!(ranges.range(7), Some(5..6));
        assert_eq!(ranges.range(0), None);
        assert_eq!(ranges.range(8), None);
        assert_eq!(ranges.occupied_cells(), 3);
    }

    #[test]
    fn stale_ranges_are_cleared_on_rebuild() {
        let runner = CpuRunner::with_threads(1).unwrap();
        let ranges = CellRanges::new(4);

        ranges.rebuild(&runner, &[0, 0, 2], 3).unwrap();
        ranges.rebuild(&runner, &[3, 3, 3], 3).unwrap();
        assert_eq!(ranges.range(0), None);
        assert_eq!(ranges.range(2), None);
        assert_eq!(ranges.range(3), Some(0..3));
    }

    #[test]
    fn padding_past_count_is_ignored() {
        let runner = CpuRunner::with_threads(1).unwrap();
        let ranges = CellRanges::new(4);
        let sorted = [2u32, 2, 2, CELL_EMPTY];

        ranges.rebuild(&runner, &sorted, 3).unwrap();
        assert_eq!(ranges.range(2), Some(0..3));
        assert_eq!(ranges.occupied_cells(), 1);
    }

    #[test]
    fn short_buffer_is_refused() {
        let runner = CpuRunner::with_threads(1).unwrap();
        let ranges = CellRanges::new(4);
        assert!(matches!(
            ranges.rebuild(&runner, &[0, 1], 3),
            Err(SimError::BufferTooSmall { required: 3, .. })
        ));
    }
}
