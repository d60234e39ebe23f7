//! Types shared between the host orchestration and the compute kernels.
//!
//! Everything passed to a dispatch as a uniform is `#[repr(C)]` and `Pod` so the
//! same layout can be uploaded to a device buffer unchanged.
#![cfg_attr(not(test), no_std)]

pub mod boids;
pub mod grid;

use bytemuck::{Pod, Zeroable};
use core::fmt::{self, Display};

pub use boids::{FlockParams, IndirectDrawArgs};
pub use grid::GridParams;

/// Default number of lanes per workgroup for per-agent and per-cell passes.
pub const WORKGROUP_SIZE: u32 = 256;

/// Default number of lanes per workgroup for the local sort passes.
/// Each workgroup owns `2 * SORT_LOCAL_SIZE` elements.
pub const SORT_LOCAL_SIZE: u32 = 512;

/// Marks a cell with no members in both the start and end range buffers.
pub const CELL_EMPTY: u32 = u32::MAX;

/// Key written past the live agent count so padding sorts after every real cell id.
pub const KEY_PADDING: u32 = u32::MAX;

#[inline]
pub const fn div_ceil_u32(n: u32, d: u32) -> u32 {
    // Precondition: d > 0
    n / d + ((n % d) != 0) as u32
}

pub fn num_workgroups_1d(num_elements: u32, workgroup_size: u32) -> [u32; 3] {
    [div_ceil_u32(num_elements, workgroup_size), 1, 1]
}

/// Newtype wrapper for lane ids to keep them apart from element indices
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ThreadId(u32);

impl ThreadId {
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Which step of the bitonic network a sort dispatch performs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum SortAlgorithm {
    /// Full bitonic merge sort of one workgroup's block
    LocalBms = 0,
    /// Disperse passes that fit inside one workgroup's block
    LocalDisperse = 1,
    /// Mirrored compare across a span of `h` elements
    BigFlip = 2,
    /// Half-distance compare across a span of `h` elements
    BigDisperse = 3,
}

impl SortAlgorithm {
    /// Local passes run one workgroup per block; big passes address the whole array.
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, SortAlgorithm::LocalBms | SortAlgorithm::LocalDisperse)
    }
}

impl Display for SortAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortAlgorithm::LocalBms => write!(f, "local_bms"),
            SortAlgorithm::LocalDisperse => write!(f, "local_disperse"),
            SortAlgorithm::BigFlip => write!(f, "big_flip"),
            SortAlgorithm::BigDisperse => write!(f, "big_disperse"),
        }
    }
}

impl TryFrom<u32> for SortAlgorithm {
    type Error = &'static str;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SortAlgorithm::LocalBms),
            1 => Ok(SortAlgorithm::LocalDisperse),
            2 => Ok(SortAlgorithm::BigFlip),
            3 => Ok(SortAlgorithm::BigDisperse),
            _ => Err("Invalid SortAlgorithm value"),
        }
    }
}

impl From<SortAlgorithm> for u32 {
    fn from(algorithm: SortAlgorithm) -> u32 {
        algorithm as u32
    }
}

/// Uniforms for one bitonic sort dispatch
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SortParams {
    /// Span (or block) size the pass operates on
    pub h: u32,
    pub algorithm: u32, // SortAlgorithm as u32
    /// Number of elements being sorted (a power of two)
    pub count: u32,
}

impl SortParams {
    #[inline]
    pub fn new(algorithm: SortAlgorithm, h: u32, count: u32) -> Self {
        Self {
            h,
            algorithm: algorithm.into(),
            count,
        }
    }

    #[inline]
    pub fn algorithm(&self) -> Result<SortAlgorithm, &'static str> {
        SortAlgorithm::try_from(self.algorithm)
    }
}

/// Uniforms for the per-cell and per-agent range passes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RangeParams {
    pub boid_count: u32,
    pub total_cells: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroup_count_rounds_up() {
        assert_eq!(num_workgroups_1d(0, 256), [0, 1, 1]);
        assert_eq!(num_workgroups_1d(1, 256), [1, 1, 1]);
        assert_eq!(num_workgroups_1d(256, 256), [1, 1, 1]);
        assert_eq!(num_workgroups_1d(257, 256), [2, 1, 1]);
        assert_eq!(num_workgroups_1d(1000, 256), [4, 1, 1]);
    }

    #[test]
    fn sort_algorithm_round_trips_through_u32() {
        for algorithm in [
            SortAlgorithm::LocalBms,
            SortAlgorithm::LocalDisperse,
            SortAlgorithm::BigFlip,
            SortAlgorithm::BigDisperse,
        ] {
            let params = SortParams::new(algorithm, 1024, 4096);
            assert_eq!(params.algorithm(), Ok(algorithm));
        }
        assert!(SortAlgorithm::try_from(7).is_err());
    }

    #[test]
    fn only_local_passes_are_block_scoped() {
        assert!(SortAlgorithm::LocalBms.is_local());
        assert!(SortAlgorithm::LocalDisperse.is_local());
        assert!(!SortAlgorithm::BigFlip.is_local());
        assert!(!SortAlgorithm::BigDisperse.is_local());
    }
}
