//! Evaluation parameters and the per-shape lookup table.

use std::collections::BTreeMap;

use molar_grid::GridDims;
use serde::{Deserialize, Serialize};

use crate::{EvalError, Result};

/// Density above which a voxel counts as filled during evaluation.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Undercuts forgiven before the score drops below 100.
pub const DEFAULT_UNDERCUT_ALLOWANCE: u32 = 10;

/// Parameters of one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToothParameters {
    /// First layer of the preparation zone. Carving below it is always an
    /// error.
    pub start_y: usize,
    /// Clinically targeted margin distance in millimetres.
    pub target_distance_mm: f32,
    /// Filled/empty threshold.
    pub threshold: f32,
    /// Undercuts allowed before the score drops.
    pub undercut_allowance: u32,
    /// Millimetres per world unit.
    pub mm_per_unit: f32,
}

impl ToothParameters {
    /// Parameters with default threshold, allowance and unit scale.
    pub fn new(start_y: usize, target_distance_mm: f32) -> Self {
        Self {
            start_y,
            target_distance_mm,
            threshold: DEFAULT_THRESHOLD,
            undercut_allowance: DEFAULT_UNDERCUT_ALLOWANCE,
            mm_per_unit: 1.0,
        }
    }

    /// Replace the undercut allowance.
    pub fn with_allowance(mut self, allowance: u32) -> Self {
        self.undercut_allowance = allowance;
        self
    }
}

/// Per-shape configuration: where the preparation zone starts and the
/// margin the preparation should leave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeParams {
    /// Start of the preparation zone as a fraction of grid height.
    pub start_y: f32,
    /// Target margin distance in millimetres.
    pub target_distance_mm: f32,
}

impl ShapeParams {
    /// First preparation layer for a grid of `dims`.
    pub fn start_layer(&self, dims: GridDims) -> usize {
        let layer = (self.start_y.clamp(0.0, 1.0) * dims.y as f32).floor() as usize;
        layer.min(dims.y)
    }
}

/// Named tooth shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeTable {
    shapes: BTreeMap<String, ShapeParams>,
}

impl ShapeTable {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            shapes: BTreeMap::new(),
        }
    }

    /// Add or replace a shape.
    pub fn insert(&mut self, name: impl Into<String>, params: ShapeParams) {
        self.shapes.insert(name.into(), params);
    }

    /// Look up a shape by name.
    pub fn get(&self, name: &str) -> Result<&ShapeParams> {
        self.shapes
            .get(name)
            .ok_or_else(|| EvalError::UnknownShape(name.to_string()))
    }

    /// Shape names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True if the table has no shapes.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Check every entry is usable.
    pub fn validate(&self) -> Result<()> {
        for (name, p) in &self.shapes {
            if !(0.0..=1.0).contains(&p.start_y) {
                return Err(EvalError::InvalidShape(format!(
                    "{name}: start_y {} outside [0, 1]",
                    p.start_y
                )));
            }
            if !(p.target_distance_mm.is_finite() && p.target_distance_mm >= 0.0) {
                return Err(EvalError::InvalidShape(format!(
                    "{name}: target distance {}",
                    p.target_distance_mm
                )));
            }
        }
        Ok(())
    }

    /// Evaluation parameters for `name` on a grid of `dims`.
    pub fn parameters(&self, name: &str, dims: GridDims) -> Result<ToothParameters> {
        let shape = self.get(name)?;
        Ok(ToothParameters::new(
            shape.start_layer(dims),
            shape.target_distance_mm,
        ))
    }
}

impl Default for ShapeTable {
    fn default() -> Self {
        let mut table = Self::new();
        table.insert(
            "molar",
            ShapeParams {
                start_y: 0.3,
                target_distance_mm: 1.5,
            },
        );
        table.insert(
            "premolar",
            ShapeParams {
                start_y: 0.35,
                target_distance_mm: 1.2,
            },
        );
        table.insert(
            "incisor",
            ShapeParams {
                start_y: 0.4,
                target_distance_mm: 1.0,
            },
        );
        table
    }
}
