#![warn(missing_docs)]

//! Post-hoc scoring of a carved tooth.
//!
//! [`evaluate`] compares the current density grid with the pristine one
//! and reports undercuts (cavities a tool coming from above cannot reach),
//! the carved area, and a per-voxel margin error against the target
//! distance of the tooth shape. Shape parameters come from a
//! [`ShapeTable`], usually loaded from configuration.

mod evaluator;
mod params;

pub use evaluator::{evaluate, EvaluationResult, MASK_CLEAR, MASK_SET};
pub use params::{
    ShapeParams, ShapeTable, ToothParameters, DEFAULT_THRESHOLD, DEFAULT_UNDERCUT_ALLOWANCE,
};

use molar_grid::GridError;
use thiserror::Error;

/// Errors from evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The shape name is not in the table.
    #[error("unknown tooth shape: {0}")]
    UnknownShape(String),

    /// A shape table entry is out of range.
    #[error("invalid shape parameters: {0}")]
    InvalidShape(String),

    /// The filled/empty threshold is not finite.
    #[error("invalid threshold: {0}")]
    InvalidThreshold(f32),

    /// The two grids cannot be compared.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Result type for evaluation.
pub type Result<T> = std::result::Result<T, EvalError>;
