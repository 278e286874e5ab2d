//! Simulation settings, loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid config:
//!
//! ```toml
//! backend = "cpu"
//! toughness = { uniform = 0.5 }
//!
//! [voxelizer]
//! resolution = 96
//!
//! [evaluation.shapes.molar]
//! start_y = 0.3
//! target_distance_mm = 1.5
//! ```

use std::path::Path;

use molar_carve::{
    Tool, ToolKind, DEFAULT_CAPSULE_HALF_LENGTH, DEFAULT_CAPSULE_RANGE, DEFAULT_SPHERE_RANGE,
};
use molar_eval::{ShapeTable, ToothParameters, DEFAULT_THRESHOLD, DEFAULT_UNDERCUT_ALLOWANCE};
use molar_grid::{DensityField, GridDims, ToughnessField};
use molar_math::{Point3, Transform};
use serde::{Deserialize, Serialize};

use crate::{MolarError, Result};

/// Where carving and surface extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Host threads.
    #[default]
    Cpu,
    /// wgpu compute. Needs the `gpu` feature and a device context.
    Gpu,
}

/// How the toughness grid is derived from the initial density.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToughnessSource {
    /// `max(initial density, 0)`: the deeper inside the solid, the harder.
    #[default]
    FromDensity,
    /// The same toughness everywhere.
    Uniform(f32),
}

impl ToughnessSource {
    /// Build the toughness grid for a tooth.
    pub fn build(&self, initial: &DensityField) -> ToughnessField {
        match *self {
            ToughnessSource::FromDensity => initial.map(|&d| d.max(0.0)),
            ToughnessSource::Uniform(t) => ToughnessField::filled(initial.dims(), t),
        }
    }
}

/// Mesh voxelizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// Voxels along the mesh's longest axis, padding included.
    pub resolution: usize,
    /// Blur passes after the fill.
    pub smoothing_passes: usize,
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            resolution: 128,
            smoothing_passes: 1,
        }
    }
}

/// Surface reconstruction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Maximum triangles per rebuild. Extra triangles are dropped.
    pub triangle_budget: usize,
    /// Density of the reconstructed surface.
    pub isovalue: f32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            triangle_budget: 1_000_000,
            isovalue: 0.0,
        }
    }
}

/// Defaults for tools created from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Density removed per step at full trigger.
    pub power: f32,
    /// Influence radius of sphere tools.
    pub sphere_range: f32,
    /// Influence radius of capsule tools.
    pub capsule_range: f32,
    /// Local centre-to-tip distance of capsule tools.
    pub capsule_half_length: f32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            power: 1.0,
            sphere_range: DEFAULT_SPHERE_RANGE,
            capsule_range: DEFAULT_CAPSULE_RANGE,
            capsule_half_length: DEFAULT_CAPSULE_HALF_LENGTH,
        }
    }
}

impl ToolConfig {
    /// A sphere tool at `position`, power scaled by `trigger` in `[0, 1]`.
    pub fn sphere(&self, position: Point3, trigger: f32) -> Tool {
        Tool::sphere(position, self.power * trigger.clamp(0.0, 1.0)).with_range(self.sphere_range)
    }

    /// A capsule tool with world `transform`, power scaled by `trigger`.
    pub fn capsule(&self, transform: Transform, trigger: f32) -> Tool {
        Tool {
            kind: ToolKind::Capsule {
                half_length: self.capsule_half_length,
            },
            transform,
            power: self.power * trigger.clamp(0.0, 1.0),
            range: self.capsule_range,
        }
    }
}

/// Evaluator settings and the tooth shape table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Density above which a voxel counts as filled.
    pub threshold: f32,
    /// Undercuts tolerated before the score drops below 100.
    pub undercut_allowance: u32,
    /// Millimetres per world unit, for margin distances.
    pub millimetres_per_unit: f32,
    /// Preparation zone and target margin per tooth shape.
    pub shapes: ShapeTable,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            undercut_allowance: DEFAULT_UNDERCUT_ALLOWANCE,
            millimetres_per_unit: 1.0,
            shapes: ShapeTable::default(),
        }
    }
}

impl EvaluationConfig {
    /// Evaluator parameters for `shape` on a grid of `dims`.
    pub fn parameters(&self, shape: &str, dims: GridDims) -> Result<ToothParameters> {
        let mut params = self.shapes.parameters(shape, dims)?;
        params.threshold = self.threshold;
        params.undercut_allowance = self.undercut_allowance;
        params.mm_per_unit = self.millimetres_per_unit;
        Ok(params)
    }
}

/// Everything a [`Simulation`](crate::Simulation) needs to know.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Compute backend.
    pub backend: BackendKind,
    /// Toughness derivation.
    pub toughness: ToughnessSource,
    /// Mesh voxelizer.
    pub voxelizer: VoxelizerConfig,
    /// Surface reconstruction.
    pub builder: BuilderConfig,
    /// Tool defaults.
    pub tools: ToolConfig,
    /// Evaluation.
    pub evaluation: EvaluationConfig,
}

impl SimulationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.voxelizer.resolution < 8 {
            return Err(MolarError::InvalidConfig(format!(
                "voxelizer.resolution must be at least 8, got {}",
                self.voxelizer.resolution
            )));
        }
        if self.builder.triangle_budget == 0 {
            return Err(MolarError::InvalidConfig(
                "builder.triangle_budget must be positive".into(),
            ));
        }
        if !self.builder.isovalue.is_finite() {
            return Err(MolarError::InvalidConfig(
                "builder.isovalue must be finite".into(),
            ));
        }
        if let ToughnessSource::Uniform(t) = self.toughness {
            if !(t.is_finite() && t >= 0.0) {
                return Err(MolarError::InvalidConfig(format!(
                    "uniform toughness must be non-negative, got {t}"
                )));
            }
        }
        let tools = &self.tools;
        for (name, value) in [
            ("tools.sphere_range", tools.sphere_range),
            ("tools.capsule_range", tools.capsule_range),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(MolarError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(tools.power.is_finite() && tools.power >= 0.0) {
            return Err(MolarError::InvalidConfig(format!(
                "tools.power must be non-negative, got {}",
                tools.power
            )));
        }
        if !(tools.capsule_half_length.is_finite() && tools.capsule_half_length >= 0.0) {
            return Err(MolarError::InvalidConfig(format!(
                "tools.capsule_half_length must be non-negative, got {}",
                tools.capsule_half_length
            )));
        }
        let eval = &self.evaluation;
        if !eval.threshold.is_finite() {
            return Err(MolarError::InvalidConfig(
                "evaluation.threshold must be finite".into(),
            ));
        }
        if !(eval.millimetres_per_unit.is_finite() && eval.millimetres_per_unit > 0.0) {
            return Err(MolarError::InvalidConfig(format!(
                "evaluation.millimetres_per_unit must be positive, got {}",
                eval.millimetres_per_unit
            )));
        }
        eval.shapes.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.backend, BackendKind::Cpu);
        assert_eq!(config.voxelizer.resolution, 128);
        assert_eq!(config.builder.triangle_budget, 1_000_000);
        assert_eq!(config.evaluation.shapes.len(), 3);
    }

    #[test]
    fn test_partial_sections() {
        let config = SimulationConfig::from_toml_str(
            r#"
            backend = "gpu"
            toughness = { uniform = 0.5 }

            [voxelizer]
            resolution = 64

            [evaluation]
            undercut_allowance = 0

            [evaluation.shapes.canine]
            start_y = 0.25
            target_distance_mm = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Gpu);
        assert_eq!(config.toughness, ToughnessSource::Uniform(0.5));
        assert_eq!(config.voxelizer.resolution, 64);
        assert_eq!(config.voxelizer.smoothing_passes, 1);
        assert_eq!(config.evaluation.undercut_allowance, 0);
        assert_eq!(config.evaluation.shapes.names().collect::<Vec<_>>(), ["canine"]);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = SimulationConfig::default();
        config.builder.triangle_budget = 5000;
        config.tools.power = 0.5;
        let text = toml::to_string(&config).unwrap();
        assert_eq!(SimulationConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimulationConfig::default();
        config.builder.triangle_budget = 0;
        assert!(matches!(config.validate(), Err(MolarError::InvalidConfig(_))));

        let mut config = SimulationConfig::default();
        config.tools.sphere_range = -1.0;
        assert!(matches!(config.validate(), Err(MolarError::InvalidConfig(_))));

        let mut config = SimulationConfig::default();
        config.toughness = ToughnessSource::Uniform(f32::NAN);
        assert!(config.validate().is_err());

        assert!(matches!(
            SimulationConfig::from_toml_str("[evaluation.shapes.bad]\nstart_y = 2.0\ntarget_distance_mm = 1.0"),
            Err(MolarError::Eval(_))
        ));
        assert!(matches!(
            SimulationConfig::from_toml_str("backend = \"tpu\""),
            Err(MolarError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_toughness_from_density() {
        let dims = GridDims::new(2, 1, 1);
        let initial = DensityField::from_vec(dims, vec![0.8, -1.0]).unwrap();
        let toughness = ToughnessSource::FromDensity.build(&initial);
        assert_eq!(toughness.as_slice(), &[0.8, 0.0]);
        let uniform = ToughnessSource::Uniform(2.0).build(&initial);
        assert_eq!(uniform.as_slice(), &[2.0, 2.0]);
    }

    #[test]
    fn test_tool_defaults_and_trigger() {
        let tools = ToolConfig::default();
        let sphere = tools.sphere(Point3::new(1.0, 2.0, 3.0), 0.5);
        assert_relative_eq!(sphere.power, 0.5);
        assert_relative_eq!(sphere.range, DEFAULT_SPHERE_RANGE);
        assert_eq!(sphere.position(), Point3::new(1.0, 2.0, 3.0));

        let capsule = tools.capsule(Transform::identity(), 3.0);
        assert_relative_eq!(capsule.power, 1.0);
        assert_eq!(
            capsule.kind,
            ToolKind::Capsule {
                half_length: DEFAULT_CAPSULE_HALF_LENGTH
            }
        );
    }

    #[test]
    fn test_evaluation_parameters_take_config_values() {
        let mut eval = EvaluationConfig::default();
        eval.threshold = 0.2;
        eval.undercut_allowance = 3;
        let params = eval.parameters("molar", GridDims::new(10, 100, 10)).unwrap();
        assert_eq!(params.start_y, 30);
        assert_relative_eq!(params.threshold, 0.2);
        assert_eq!(params.undercut_allowance, 3);
        assert!(matches!(
            eval.parameters("wisdom", GridDims::cube(4)),
            Err(MolarError::Eval(_))
        ));
    }
}
