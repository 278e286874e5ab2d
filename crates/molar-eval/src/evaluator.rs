//! Scoring a carved tooth against its pristine grid.

use molar_grid::{DensityField, Field, GridError, TexCoord, TexCoordField};
use rayon::prelude::*;

use crate::params::ToothParameters;
use crate::{EvalError, Result};

/// Mask value for a set voxel.
pub const MASK_SET: f32 = 1.0;
/// Mask value for a clear voxel.
pub const MASK_CLEAR: f32 = -1.0;

/// Largest absolute margin error before remapping to a texture coordinate.
const ERROR_CLAMP: f32 = 0.95;

/// Texture coordinate of voxels the margin pass does not reach.
const UNSCORED_UV: TexCoord = [0.5, 0.0];

/// Snapshot produced by one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// `min(100, 100 + allowance - undercuts)`.
    pub score: f32,
    /// Undercut voxels counted against the score.
    pub undercut_count: usize,
    /// [`MASK_SET`] where carving is an error, [`MASK_CLEAR`] elsewhere.
    pub errors: Field<f32>,
    /// [`MASK_SET`] where material was removed.
    pub carved_area: Field<f32>,
    /// Normalised margin error in `u`; `v` is 0.5 for scored voxels.
    pub distance_uvs: TexCoordField,
}

impl EvaluationResult {
    /// Number of voxels flagged as errors, counted or not.
    pub fn error_voxels(&self) -> usize {
        self.errors.count_above(0.0)
    }

    /// Number of carved voxels.
    pub fn carved_voxels(&self) -> usize {
        self.carved_area.count_above(0.0)
    }
}

/// Compare `current` against `initial`.
///
/// A voxel is filled if its density exceeds the threshold and carved if it
/// is no longer filled but was filled initially. Scanning layers from the
/// top:
///
/// - a filled voxel over a carved one marks the carved one as an undercut;
/// - a carved voxel below `start_y` is an error but not counted;
/// - a carved voxel under an undercut that is itself empty inherits it.
///
/// The margin pass then measures, for every solid voxel of the
/// preparation zone, the planar distance to the original outline of its
/// layer and stores the normalised error as a texture coordinate.
pub fn evaluate(
    initial: &DensityField,
    current: &DensityField,
    params: &ToothParameters,
    voxel_size: f32,
) -> Result<EvaluationResult> {
    initial.ensure_same_dims(current)?;
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(GridError::InvalidVoxelSize(voxel_size).into());
    }
    if !params.threshold.is_finite() {
        return Err(EvalError::InvalidThreshold(params.threshold));
    }
    let dims = initial.dims();

    let mut errors = Field::filled(dims, MASK_CLEAR);
    let mut carved_area = Field::filled(dims, MASK_CLEAR);
    let undercut_count = detect_undercuts(initial, current, params, &mut errors, &mut carved_area);

    let shell = build_shell(initial, params);
    let mut distance_uvs = TexCoordField::filled(dims, UNSCORED_UV);
    score_margins(current, params, voxel_size, &shell, &mut distance_uvs);

    let score = (100.0 + params.undercut_allowance as f32 - undercut_count as f32).min(100.0);
    log::info!("evaluated {dims} tooth: score {score}, {undercut_count} undercuts");
    Ok(EvaluationResult {
        score,
        undercut_count,
        errors,
        carved_area,
        distance_uvs,
    })
}

fn detect_undercuts(
    initial: &DensityField,
    current: &DensityField,
    params: &ToothParameters,
    errors: &mut Field<f32>,
    carved_area: &mut Field<f32>,
) -> usize {
    let dims = initial.dims();
    let thr = params.threshold;
    let init = initial.as_slice();
    let cur = current.as_slice();
    let layer = dims.x;
    let mut undercuts = 0;

    for y in (0..dims.y).rev() {
        for z in 0..dims.z {
            for x in 0..dims.x {
                let i = dims.index(x, y, z);
                if cur[i] > thr {
                    if y > 0 {
                        let below = i - layer;
                        if cur[below] < thr && init[below] > thr {
                            *errors.get_mut(x, y - 1, z) = MASK_SET;
                            undercuts += 1;
                        }
                    }
                    continue;
                }
                if init[i] < thr {
                    continue;
                }
                *carved_area.get_mut(x, y, z) = MASK_SET;
                if y < params.start_y {
                    *errors.get_mut(x, y, z) = MASK_SET;
                    continue;
                }
                if y + 1 < dims.y {
                    let above = i + layer;
                    if errors.as_slice()[above] > 0.0 && cur[above] < thr {
                        *errors.get_mut(x, y, z) = MASK_SET;
                        undercuts += 1;
                    }
                }
            }
        }
    }
    undercuts
}

/// Outline points `(x, z)` of the initial grid for each layer of the
/// preparation zone, indexed by `y - start_y`.
fn build_shell(initial: &DensityField, params: &ToothParameters) -> Vec<Vec<[i32; 2]>> {
    let dims = initial.dims();
    let thr = params.threshold;
    let start = params.start_y.min(dims.y);
    let top = dims.y.saturating_sub(1);
    if dims.x < 3 || dims.z < 3 || start >= top {
        return Vec::new();
    }
    let v = |x: usize, y: usize, z: usize| *initial.get(x, y, z);

    (start..top)
        .into_par_iter()
        .map(|y| {
            let mut ring = Vec::new();
            for z in 1..dims.z - 1 {
                for x in 1..dims.x - 1 {
                    if v(x, y, z) < thr {
                        continue;
                    }
                    let open = v(x + 1, y, z) < thr
                        || v(x - 1, y, z) < thr
                        || v(x, y, z + 1) < thr
                        || v(x, y, z - 1) < thr
                        || v(x + 1, y, z + 1) < thr
                        || v(x + 1, y, z - 1) < thr
                        || v(x - 1, y, z + 1) < thr
                        || v(x - 1, y, z - 1) < thr
                        || v(x, y + 1, z) < thr;
                    if open {
                        ring.push([x as i32, z as i32]);
                    }
                }
            }
            ring
        })
        .collect()
}

fn score_margins(
    current: &DensityField,
    params: &ToothParameters,
    voxel_size: f32,
    shell: &[Vec<[i32; 2]>],
    distance_uvs: &mut TexCoordField,
) {
    let dims = current.dims();
    if shell.is_empty() || dims.x < 3 || dims.z < 3 {
        return;
    }
    let start = params.start_y;
    let top = dims.y - 1;
    let zone = (dims.y - start) as f32;
    let cur = current.as_slice();
    let slice = dims.slice_len();
    let thr = params.threshold;
    let mm = voxel_size * params.mm_per_unit;

    distance_uvs
        .as_mut_slice()
        .par_chunks_mut(slice)
        .enumerate()
        .filter(|(z, _)| *z >= 1 && *z + 1 < dims.z)
        .for_each(|(z, out)| {
            for y in start..top {
                // Only the top quarter of the zone looks at neighbouring layers.
                let reach: isize = if (y - start) as f32 >= 0.75 * zone { 1 } else { 0 };
                let lo = (y - start) as isize - reach;
                let hi = (y - start) as isize + reach;
                for x in 1..dims.x - 1 {
                    let i = x + y * dims.x;
                    if cur[z * slice + i] <= thr {
                        continue;
                    }
                    let mut min_sq = f32::INFINITY;
                    for l in lo.max(0)..=hi.min(shell.len() as isize - 1) {
                        for p in &shell[l as usize] {
                            let dx = (p[0] - x as i32) as f32;
                            let dz = (p[1] - z as i32) as f32;
                            min_sq = min_sq.min(dx * dx + dz * dz);
                        }
                    }
                    let err = if min_sq.is_finite() {
                        (mm * min_sq.sqrt() - params.target_distance_mm)
                            .clamp(-ERROR_CLAMP, ERROR_CLAMP)
                    } else {
                        ERROR_CLAMP
                    };
                    out[i] = [(err + 1.0) / 2.0, 0.5];
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use molar_grid::{CubeSource, GridDims, VoxelSource};

    fn scenario() -> (DensityField, DensityField) {
        let initial = CubeSource.density(GridDims::cube(8));
        let mut current = initial.clone();
        current.set(4, 4, 4, -1.0);
        (initial, current)
    }

    #[test]
    fn test_uncarved_tooth_scores_full() {
        let initial = CubeSource.density(GridDims::cube(8));
        let result = evaluate(&initial, &initial, &ToothParameters::new(2, 1.0), 0.1).unwrap();
        assert_eq!(result.undercut_count, 0);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.error_voxels(), 0);
        assert_eq!(result.carved_voxels(), 0);
    }

    #[test]
    fn test_carving_under_solid_is_undercut() {
        let (initial, current) = scenario();
        let params = ToothParameters::new(0, 1.0).with_allowance(0);
        let result = evaluate(&initial, &current, &params, 0.1).unwrap();
        assert_eq!(result.undercut_count, 1);
        assert_eq!(*result.errors.get(4, 4, 4), MASK_SET);
        assert_eq!(*result.carved_area.get(4, 4, 4), MASK_SET);
        assert_eq!(result.score, 99.0);
        assert!(result.score < 100.0);
    }

    #[test]
    fn test_allowance_absorbs_undercuts() {
        let (initial, current) = scenario();
        let result = evaluate(&initial, &current, &ToothParameters::new(0, 1.0), 0.1).unwrap();
        assert_eq!(result.undercut_count, 1);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_undercut_propagates_down() {
        let initial = CubeSource.density(GridDims::cube(8));
        let mut current = initial.clone();
        for y in 2..=4 {
            current.set(3, y, 3, -1.0);
        }
        let params = ToothParameters::new(0, 1.0).with_allowance(0);
        let result = evaluate(&initial, &current, &params, 0.1).unwrap();
        assert_eq!(result.undercut_count, 3);
        for y in 2..=4 {
            assert_eq!(*result.errors.get(3, y, 3), MASK_SET);
        }
        assert_eq!(*result.errors.get(3, 1, 3), MASK_CLEAR);
    }

    #[test]
    fn test_open_cut_is_not_undercut() {
        // Drilling straight down from the top leaves nothing above.
        let initial = CubeSource.density(GridDims::cube(8));
        let mut current = initial.clone();
        for y in 4..8 {
            current.set(3, y, 3, -1.0);
        }
        let result = evaluate(&initial, &current, &ToothParameters::new(2, 1.0), 0.1).unwrap();
        assert_eq!(result.undercut_count, 0);
        assert_eq!(result.carved_voxels(), 3);
        assert_eq!(result.error_voxels(), 0);
    }

    #[test]
    fn test_carving_below_start_is_error_without_count() {
        let initial = CubeSource.density(GridDims::cube(8));
        let mut current = initial.clone();
        for y in 1..8 {
            current.set(3, y, 3, -1.0);
        }
        let result = evaluate(&initial, &current, &ToothParameters::new(3, 1.0), 0.1).unwrap();
        assert_eq!(result.undercut_count, 0);
        assert_eq!(*result.errors.get(3, 1, 3), MASK_SET);
        assert_eq!(*result.errors.get(3, 2, 3), MASK_SET);
        assert_eq!(*result.errors.get(3, 3, 3), MASK_CLEAR);
    }

    #[test]
    fn test_margin_distance_uvs() {
        let dims = GridDims::new(9, 8, 9);
        let initial = CubeSource.density(dims);
        let params = ToothParameters::new(2, 0.0);
        let result = evaluate(&initial, &initial, &params, 0.1).unwrap();

        // Outline voxel: zero distance, zero error.
        assert_relative_eq!(result.distance_uvs.get(1, 3, 4)[0], 0.5);
        assert_relative_eq!(result.distance_uvs.get(1, 3, 4)[1], 0.5);
        // Three voxels in from the outline: 0.3 mm past the target.
        assert_relative_eq!(result.distance_uvs.get(4, 3, 4)[0], 0.65, epsilon = 1e-6);
        // Below the zone and in empty space nothing is scored.
        assert_eq!(*result.distance_uvs.get(4, 1, 4), UNSCORED_UV);
        assert_eq!(*result.distance_uvs.get(0, 3, 4), UNSCORED_UV);
    }

    #[test]
    fn test_margin_error_is_clamped() {
        let dims = GridDims::new(9, 8, 9);
        let initial = CubeSource.density(dims);
        let params = ToothParameters::new(2, 0.0);
        let result = evaluate(&initial, &initial, &params, 10.0).unwrap();
        assert_relative_eq!(result.distance_uvs.get(4, 3, 4)[0], 0.975, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_mismatched_grids() {
        let a = DensityField::filled(GridDims::cube(4), 1.0);
        let b = DensityField::filled(GridDims::cube(5), 1.0);
        assert!(evaluate(&a, &b, &ToothParameters::new(0, 1.0), 0.1).is_err());
        assert!(evaluate(&a, &a, &ToothParameters::new(0, 1.0), 0.0).is_err());
    }
}
