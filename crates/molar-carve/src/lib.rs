#![warn(missing_docs)]

//! Carving tools for molar density grids.
//!
//! A [`Tool`] describes a sphere or capsule removal volume in world space.
//! [`carve`] lowers density inside it, weighted by how deep the voxel sits
//! in the volume and by the voxel's toughness, and flags voxels where the
//! tool met solid material. [`read_collision`] turns those flags into a
//! per-step report; [`clear_collision`] resets them.
//!
//! # Example
//!
//! ```
//! use molar_carve::{carve, read_collision, CarveGrids, Tool};
//! use molar_grid::{CollisionBuffer, CubeSource, GridDims, GridPlacement, ToughnessField, VoxelSource};
//! use molar_math::Point3;
//!
//! let dims = GridDims::cube(16);
//! let placement = GridPlacement::centered(Point3::origin(), 0.05, dims);
//! let mut density = CubeSource.density(dims);
//! let toughness = ToughnessField::filled(dims, 0.0);
//! let mut collision = CollisionBuffer::filled(dims, 0.0);
//!
//! let tool = Tool::sphere(Point3::origin(), 1.0);
//! let stats = carve(&tool, &placement, CarveGrids {
//!     density: &mut density,
//!     toughness: &toughness,
//!     collision: &mut collision,
//! }).unwrap();
//! assert!(read_collision(&collision, &stats.region).collided);
//! ```

mod carve;
mod collision;
mod tool;

pub use carve::{carve, CarveGrids, CarveStats, MIN_DENSITY, SOLID_THRESHOLD};
pub use collision::{clear_collision, read_collision, CollisionReport};
pub use tool::{
    segment_distance, Tool, ToolKind, DEFAULT_CAPSULE_HALF_LENGTH, DEFAULT_CAPSULE_RANGE,
    DEFAULT_SPHERE_RANGE,
};

use molar_grid::GridError;
use thiserror::Error;

/// Errors from carving.
#[derive(Debug, Error)]
pub enum CarveError {
    /// Influence radius is not a positive finite number.
    #[error("invalid tool range: {0}")]
    InvalidRange(f32),

    /// Power is negative or not finite.
    #[error("invalid tool power: {0}")]
    InvalidPower(f32),

    /// Capsule half length is negative or not finite.
    #[error("invalid capsule half length: {0}")]
    InvalidHalfLength(f32),

    /// The grids do not match the placement.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Result type for carving.
pub type Result<T> = std::result::Result<T, CarveError>;
