//! Boids with a uniform hash grid built from a bitonic sort.
//!
//! The per-tick pipeline runs the same kernels a GPU would:
//! - integrate positions and hash them into cell ids
//! - bitonic sort of `(cell id, agent id)` pairs
//! - per-cell `[start, end)` ranges over the sorted order
//! - behavior evaluation over each agent's 27 surrounding cells
//!
//! Kernels live in the `kernel` crate and are executed by a [`ComputeRunner`].

pub mod config;
pub mod error;
pub mod grid;
pub mod params;
pub mod ranges;
pub mod runners;
pub mod sorter;
pub mod strategy;

pub use config::{SimulationMode, SimulationSettings};
pub use error::{CrateResult, SimError};
pub use grid::{CellId, GridDescriptor};
pub use params::{parameter_channel, DynamicParameters, ParameterPublisher, ParameterReceiver};
pub use ranges::CellRanges;
pub use runners::{verify_sorted, ComputeRunner, CpuRunner};
pub use sorter::{BitonicSorter, SortDispatch, SortPlan, MAX_SORT_LOCAL_SIZE};
pub use strategy::{BruteForceFlock, FlockingBackend, FlockingStrategy, GridFlock, Simulation};
