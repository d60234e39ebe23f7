//! Compute kernels for the boids pipeline.
//!
//! Each function here is the body one lane (or one workgroup, for the local
//! sort passes) executes for a single dispatch. The host runner decides how
//! lanes are scheduled; the kernels only rely on the dispatch barrier between
//! passes, never on ordering between lanes of the same pass.

pub mod flock;
pub mod integrate;
pub mod ranges;
pub mod sort;

pub use flock::{boundary_avoidance, flock_agent, for_each_candidate, NeighbourAccumulator};
pub use integrate::integrate_agent;
pub use ranges::{reset_range, update_range};
pub use sort::{
    compare_and_swap, compare_and_swap_elements, disperse_pair, flip_pair, local_bms,
    local_disperse, local_flip, ComparisonPair,
};
