//! GPU compute for the molar carving engine.
//!
//! This crate runs the per-step work of a tooth on a wgpu device:
//! - Sphere and capsule carving with toughness and collision flags
//! - Collision counting and reset over a voxel region
//! - Marching cubes into fixed-size vertex and index buffers
//!
//! Results match the host implementations in `molar-carve` and
//! `molar-isosurface`, except that triangle order follows the device's
//! atomic counter.

#![warn(missing_docs)]

mod carve;
mod context;
mod grid;
pub mod kernel;
mod surface;

pub use carve::GpuCarver;
pub use context::{GpuContext, GpuError};
pub use grid::GpuGrid;
pub use kernel::Kernel;
pub use surface::GpuMeshBuilder;
