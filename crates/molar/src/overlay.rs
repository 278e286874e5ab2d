//! Evaluation results as renderable meshes.

use molar_eval::EvaluationResult;
use molar_grid::DensityField;
use molar_isosurface::{extract_mesh, Mesh};

use crate::Result;

/// Meshes for drawing an evaluation over the tooth.
#[derive(Debug, Clone)]
pub struct EvaluationOverlays {
    /// Surface around voxels where carving is an error.
    pub errors: Mesh,
    /// Surface around removed material.
    pub carved_area: Mesh,
    /// The carved surface with the normalised margin error in `u`, for a
    /// heat-map material.
    pub margin: Mesh,
}

/// Reconstruct each mask at isovalue 0, and the current surface with
/// margin texture coordinates.
pub fn overlay_meshes(
    result: &EvaluationResult,
    current: &DensityField,
    isovalue: f32,
    scale: f32,
    triangle_budget: usize,
) -> Result<EvaluationOverlays> {
    Ok(EvaluationOverlays {
        errors: extract_mesh(&result.errors, None, 0.0, scale, triangle_budget)?,
        carved_area: extract_mesh(&result.carved_area, None, 0.0, scale, triangle_budget)?,
        margin: extract_mesh(
            current,
            Some(&result.distance_uvs),
            isovalue,
            scale,
            triangle_budget,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use molar_eval::{evaluate, ToothParameters};
    use molar_grid::GridDims;

    #[test]
    fn test_overlays_follow_masks() {
        let dims = GridDims::cube(8);
        let initial = DensityField::from_fn(dims, |x, y, z| {
            if dims.is_border(x, y, z) {
                -1.0
            } else {
                1.0
            }
        });
        let mut current = initial.clone();
        current.set(4, 4, 4, -1.0);
        let result = evaluate(&initial, &current, &ToothParameters::new(0, 1.0), 0.1).unwrap();

        let overlays = overlay_meshes(&result, &current, 0.0, 0.1, 10_000).unwrap();
        // A single flagged voxel closes into an octahedron.
        assert_eq!(overlays.errors.num_triangles(), 8);
        assert_eq!(overlays.carved_area.num_triangles(), 8);
        assert!(overlays.margin.num_triangles() > 0);
    }

    #[test]
    fn test_clean_tooth_has_no_error_overlay() {
        let dims = GridDims::cube(6);
        let initial = DensityField::filled(dims, 1.0);
        let result = evaluate(&initial, &initial, &ToothParameters::new(0, 1.0), 0.1).unwrap();
        let overlays = overlay_meshes(&result, &initial, 0.0, 0.1, 1000).unwrap();
        assert!(overlays.errors.is_empty());
        assert!(overlays.carved_area.is_empty());
    }
}
