//! Error types for the simulation facade.

use thiserror::Error;

/// Errors surfaced to the host.
#[derive(Error, Debug)]
pub enum MolarError {
    /// Configuration values out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration file did not parse.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Grid shape or persisted layout problem.
    #[error(transparent)]
    Grid(#[from] molar_grid::GridError),

    /// The input mesh cannot be voxelized.
    #[error(transparent)]
    Voxelize(#[from] molar_voxelize::VoxelizeError),

    /// Surface extraction setup failed.
    #[error(transparent)]
    Isosurface(#[from] molar_isosurface::IsosurfaceError),

    /// A tool was rejected.
    #[error(transparent)]
    Carve(#[from] molar_carve::CarveError),

    /// Evaluation inputs were rejected.
    #[error(transparent)]
    Eval(#[from] molar_eval::EvalError),

    /// Device setup or readback failed.
    #[cfg(feature = "gpu")]
    #[error(transparent)]
    Gpu(#[from] molar_gpu::GpuError),

    /// The config asks for the GPU backend but none was provided.
    #[error("GPU backend requested but no device context is available")]
    GpuUnavailable,

    /// The tooth is still being voxelized.
    #[error("tooth is still voxelizing")]
    NotReady,

    /// A background worker panicked.
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, MolarError>;
