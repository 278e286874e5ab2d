#![warn(missing_docs)]

//! Mesh voxelization for the molar carving engine.
//!
//! Converts a closed triangle mesh into a signed density grid:
//!
//! 1. Every voxel whose box overlaps a triangle (exact separating-axis
//!    test) is marked as surface, remembering whether the triangle faces
//!    the scan direction (+Z) and the texture coordinate at the voxel centre.
//! 2. Each `(x, y)` column is scanned along z: a run of front-facing surface
//!    voxels opens the solid, which is filled up to and including the next
//!    run of back-facing surface voxels.
//! 3. Filled voxels get density `+1`, everything else `-1`. An optional
//!    27-neighbourhood blur softens the result.
//!
//! # Example
//!
//! ```
//! use molar_voxelize::{voxelize, TriangleMesh};
//!
//! let mesh = TriangleMesh::cuboid([1.0, 1.0, 1.0]);
//! let grid = voxelize(&mesh, 16).unwrap();
//! assert!(grid.density.count_above(0.0) > 0);
//! ```

mod mesh;
mod smooth;
mod triangle;
mod voxelizer;

pub use mesh::TriangleMesh;
pub use smooth::smooth;
pub use triangle::{triangle_box_overlap, Triangle};
pub use voxelizer::{smooth_voxelize, voxelize, VoxelizedMesh};

use thiserror::Error;

/// Errors from mesh voxelization.
#[derive(Debug, Clone, Error)]
pub enum VoxelizeError {
    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// All vertices coincide, or lie on a line or point, so no voxel size
    /// can be derived.
    #[error("mesh bounds have zero extent")]
    ZeroExtent,

    /// A triangle references a vertex that does not exist.
    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// The mesh has malformed buffers.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Target resolution leaves no room inside the padding.
    #[error("resolution too small: {0} (must exceed 4)")]
    ResolutionTooSmall(usize),
}

/// Result type for voxelization.
pub type Result<T> = std::result::Result<T, VoxelizeError>;
