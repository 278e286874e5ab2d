#![warn(missing_docs)]

//! Real-time voxel tooth carving.
//!
//! A [`Simulation`] turns a triangle mesh (or a persisted `.vox` grid) into
//! a [`Tooth`]: a signed density grid that hand-held tools carve every
//! step, with the surface rebuilt by marching cubes after the carve. When
//! the preparation is done, the tooth is scored against its pristine grid
//! for undercuts and margin distance.
//!
//! Grids live on a [`VoxelBackend`]: [`CpuBackend`] always, and a wgpu
//! backend with the `gpu` feature.
//!
//! # Example
//!
//! ```
//! use molar::{NullHaptics, Simulation, SimulationConfig};
//! use molar_grid::{GridDims, GridSnapshot, SphereSource, TexCoordField, VoxelSource};
//! use molar_math::Point3;
//!
//! let sim = Simulation::new(SimulationConfig::default()).unwrap();
//! let dims = GridDims::cube(24);
//! let snapshot = GridSnapshot::new(
//!     0.05,
//!     SphereSource.density(dims),
//!     TexCoordField::filled(dims, [0.0, 0.0]),
//! )
//! .unwrap();
//! let mut tooth = sim.tooth(snapshot, Point3::origin()).unwrap();
//!
//! let drill = sim.config().tools.sphere(Point3::new(0.0, 0.55, 0.0), 1.0);
//! let report = tooth.step(&[drill], &mut NullHaptics).unwrap();
//! assert!(report.collision.collided);
//!
//! tooth.start_evaluation("molar").unwrap();
//! let result = tooth.wait_evaluation().unwrap().unwrap();
//! assert!(result.score <= 100.0);
//! ```

mod backend;
pub mod config;
mod error;
mod evaluation;
mod haptics;
mod overlay;
mod simulation;
mod tooth;

#[cfg(feature = "gpu")]
pub use backend::GpuBackend;
pub use backend::{CpuBackend, VoxelBackend};
pub use config::{BackendKind, SimulationConfig, ToughnessSource};
pub use error::{MolarError, Result};
pub use evaluation::{EvaluationStatus, EvaluationTask};
pub use haptics::{HapticsSink, NullHaptics};
pub use overlay::{overlay_meshes, EvaluationOverlays};
pub use simulation::Simulation;
pub use tooth::{PendingTooth, StepReport, Tooth, ToothSlot};

pub use molar_carve::{CollisionReport, Tool, ToolKind};
pub use molar_eval::{EvaluationResult, ShapeParams, ShapeTable, ToothParameters};
pub use molar_isosurface::{BuildStats, Mesh, Vertex};
