#![warn(missing_docs)]

//! Marching-cubes surface extraction for molar density grids.
//!
//! [`MeshBuilder`] turns a [`DensityField`](molar_grid::DensityField) into a
//! triangle mesh whose vertices carry a position, a gradient normal and a
//! texture coordinate. Output buffers are sized once for a triangle budget
//! and rebuilt in place, which is how the renderer consumes them.
//!
//! # Example
//!
//! ```
//! use molar_grid::{CubeSource, GridDims, VoxelSource};
//! use molar_isosurface::MeshBuilder;
//!
//! let density = CubeSource.density(GridDims::cube(6));
//! let mut builder = MeshBuilder::new(density.dims(), 10_000).unwrap();
//! let stats = builder.build(&density, None, 0.0, 0.1).unwrap();
//! assert!(stats.triangles > 0);
//! ```

mod builder;
pub mod export;
mod mesh;
pub mod tables;

pub use builder::{extract_mesh, BuildStats, MeshBuilder};
pub use mesh::{Mesh, Vertex};

use molar_grid::GridDims;
use thiserror::Error;

/// Errors from surface extraction.
#[derive(Debug, Clone, Error)]
pub enum IsosurfaceError {
    /// Input grid does not match the builder's dimensions.
    #[error("builder expects a {0} grid, got {1}")]
    DimsMismatch(GridDims, GridDims),

    /// The triangle budget is zero.
    #[error("triangle budget must be positive")]
    ZeroBudget,

    /// The budget cannot be addressed with 32-bit indices.
    #[error("triangle budget {0} exceeds 32-bit index range")]
    BudgetTooLarge(usize),
}

/// Result type for surface extraction.
pub type Result<T> = std::result::Result<T, IsosurfaceError>;
