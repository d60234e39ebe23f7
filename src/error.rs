//! Error types for the library

use thiserror::Error;

/// Error types for the boids pipeline
#[derive(Error, Debug)]
pub enum SimError {
    #[error("sort count must be a non-zero power of two, got {count}")]
    InvalidArgument { count: usize },

    #[error("{what} buffer holds {len} elements but {required} are required")]
    BufferTooSmall {
        what: &'static str,
        len: usize,
        required: usize,
    },

    #[error("{what} of {requested} exceeds capacity {capacity}")]
    CapacityExceeded {
        what: &'static str,
        requested: u64,
        capacity: u64,
    },

    #[error("degenerate grid: {0}")]
    DegenerateGrid(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("simulation buffers have been released")]
    Disposed,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience type alias for Results with [`SimError`]
pub type CrateResult<T> = std::result::Result<T, SimError>;
