//! Host side of the bitonic sort: the sequence of dispatches that sorts a
//! power-of-two prefix of a key buffer, carrying a value buffer along.

use shared::{SortAlgorithm, SortParams, SORT_LOCAL_SIZE};
use tracing::{debug, trace};

use crate::{
    error::{CrateResult, SimError},
    runners::{ComputeRunner, DispatchSize},
};

/// Largest count whose doubled spans still fit in a `u32`
const MAX_SORT_COUNT: usize = 1 << 31;

/// Largest workgroup size whose block of `2 * local_size` fits in a `u32`
pub const MAX_SORT_LOCAL_SIZE: u32 = 1 << 30;

/// Bitonic sorter with a fixed workgroup size.
///
/// A workgroup of `local_size` lanes owns a block of `2 * local_size`
/// elements during the local passes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitonicSorter {
    local_size: u32,
    local_capacity: u32,
}

impl Default for BitonicSorter {
    fn default() -> Self {
        Self {
            local_size: SORT_LOCAL_SIZE,
            local_capacity: SORT_LOCAL_SIZE * 2,
        }
    }
}

impl BitonicSorter {
    /// `local_size` must be a power of two no larger than
    /// [`MAX_SORT_LOCAL_SIZE`].
    pub fn new(local_size: u32) -> CrateResult<Self> {
        if !local_size.is_power_of_two() || local_size > MAX_SORT_LOCAL_SIZE {
            return Err(SimError::InvalidConfig(format!(
                "sort local size {local_size} is not a power of two up to {MAX_SORT_LOCAL_SIZE}"
            )));
        }
        Ok(Self {
            local_size,
            local_capacity: local_size * 2,
        })
    }

    pub fn local_size(&self) -> u32 {
        self.local_size
    }

    /// Elements sorted by one workgroup in the local passes
    pub fn local_capacity(&self) -> u32 {
        self.local_capacity
    }

    /// Dispatches needed to sort `count` elements, in order.
    pub fn plan(&self, count: usize) -> CrateResult<SortPlan> {
        if count == 0 || !count.is_power_of_two() || count > MAX_SORT_COUNT {
            return Err(SimError::InvalidArgument { count });
        }
        let count = count as u32;
        Ok(SortPlan {
            count,
            local_size: self.local_size,
            local_capacity: self.local_capacity,
            next: Some(Step::LocalSort),
        })
    }

    /// Sort `keys[..count]` ascending and permute `values[..count]` the same
    /// way. Nothing is written unless `count` is a non-zero power of two and
    /// both buffers hold at least `count` elements.
    pub fn dispatch<R: ComputeRunner + ?Sized>(
        &self,
        runner: &R,
        keys: &mut [u32],
        values: &mut [u32],
        count: usize,
    ) -> CrateResult<()> {
        let plan = self.plan(count)?;
        for (what, len) in [("keys", keys.len()), ("values", values.len())] {
            if len < count {
                return Err(SimError::BufferTooSmall {
                    what,
                    len,
                    required: count,
                });
            }
        }
        debug!(count, local_size = self.local_size, "bitonic sort");

        let keys = &mut keys[..count];
        let values = &mut values[..count];
        for step in plan {
            trace!(
                algorithm = %step.algorithm(),
                h = step.params.h,
                workgroups = step.size.workgroups,
                "sort dispatch"
            );
            runner.dispatch_sort(keys, values, step.params, step.size)?;
        }
        Ok(())
    }
}

/// One dispatch of the sort kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortDispatch {
    pub params: SortParams,
    pub size: DispatchSize,
}

impl SortDispatch {
    pub fn algorithm(&self) -> SortAlgorithm {
        // plans only ever build valid algorithms
        SortAlgorithm::try_from(self.params.algorithm).unwrap_or(SortAlgorithm::LocalBms)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    LocalSort,
    Flip { h: u32 },
    Disperse { h: u32, hh: u32 },
    LocalDisperse { h: u32 },
}

/// Iterator over the dispatches of one sort, built by [`BitonicSorter::plan`]
#[derive(Clone, Debug)]
pub struct SortPlan {
    count: u32,
    local_size: u32,
    local_capacity: u32,
    next: Option<Step>,
}

impl SortPlan {
    fn local(&self, algorithm: SortAlgorithm, block: u32) -> SortDispatch {
        SortDispatch {
            params: SortParams::new(algorithm, block, self.count),
            size: DispatchSize {
                workgroups: self.count / block,
                workgroup_size: block / 2,
            },
        }
    }

    fn big(&self, algorithm: SortAlgorithm, h: u32) -> SortDispatch {
        SortDispatch {
            params: SortParams::new(algorithm, h, self.count),
            size: DispatchSize {
                workgroups: (self.count / 2 / self.local_size).max(1),
                workgroup_size: self.local_size,
            },
        }
    }

    /// First global merge span after `h`, if it still fits in `count`
    fn next_merge(&self, h: u32) -> Option<Step> {
        h.checked_mul(2)
            .filter(|&next| next <= self.count)
            .map(|h| Step::Flip { h })
    }

    fn disperse_from(&self, h: u32, hh: u32) -> Step {
        if hh >= self.local_capacity {
            Step::Disperse { h, hh }
        } else {
            Step::LocalDisperse { h }
        }
    }
}

impl Iterator for SortPlan {
    type Item = SortDispatch;

    fn next(&mut self) -> Option<SortDispatch> {
        let step = self.next?;
        let (dispatch, following) = match step {
            Step::LocalSort => {
                let block = self.count.min(self.local_capacity);
                (
                    self.local(SortAlgorithm::LocalBms, block),
                    self.next_merge(self.local_capacity),
                )
            }
            Step::Flip { h } => (
                self.big(SortAlgorithm::BigFlip, h),
                Some(self.disperse_from(h, h / 2)),
            ),
            Step::Disperse { h, hh } => (
                self.big(SortAlgorithm::BigDisperse, hh),
                Some(self.disperse_from(h, hh / 2)),
            ),
            Step::LocalDisperse { h } => (
                self.local(SortAlgorithm::LocalDisperse, self.local_capacity),
                self.next_merge(h),
            ),
        };
        self.next = following;
        Some(dispatch)
    }
}
