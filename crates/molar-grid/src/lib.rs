#![warn(missing_docs)]

//! Dense voxel grids for the molar carving engine.
//!
//! Every grid owned by a tooth (density, toughness, texture coordinates,
//! collision flags) shares one [`GridDims`] and one flattening order:
//! `index = x + y * gx + z * gx * gy`, x varying fastest. The same order is
//! used by the persisted `.vox` layout, so a field can be written to disk
//! and uploaded to the device without reshuffling.
//!
//! # Example
//!
//! ```
//! use molar_grid::{DensityField, GridDims};
//!
//! let dims = GridDims::new(4, 4, 4);
//! let mut density = DensityField::filled(dims, -1.0);
//! density.set(1, 2, 3, 1.0);
//! assert_eq!(density.as_slice()[dims.index(1, 2, 3)], 1.0);
//! ```

mod dims;
mod field;
mod io;
mod placement;
mod source;

pub use dims::GridDims;
pub use field::{CollisionBuffer, DensityField, Field, TexCoord, TexCoordField, ToughnessField};
pub use io::GridSnapshot;
pub use placement::{GridPlacement, VoxelRegion};
pub use source::{CubeSource, RandomFillSource, SphereSource, VoxelSource};

use thiserror::Error;

/// Errors from grid construction and persistence.
#[derive(Debug, Error)]
pub enum GridError {
    /// A grid dimension is zero or too large to address.
    #[error("invalid grid dimensions: {0}")]
    InvalidDims(String),

    /// Data length does not match the grid volume.
    #[error("grid data length {actual} does not match volume {expected}")]
    LengthMismatch {
        /// Voxel count implied by the dimensions.
        expected: usize,
        /// Length of the data that was supplied.
        actual: usize,
    },

    /// Two grids that must share dimensions do not.
    #[error("grid dimensions differ: {0} vs {1}")]
    DimsMismatch(GridDims, GridDims),

    /// The persisted stream ended before the grid was complete.
    #[error("voxel file is truncated")]
    Truncated,

    /// The persisted stream has bytes after the texture coordinates.
    #[error("voxel file has {0} trailing bytes")]
    TrailingBytes(usize),

    /// Voxel size is not a positive finite number.
    #[error("invalid voxel size: {0}")]
    InvalidVoxelSize(f32),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
