//! Applying tools to a density grid.

use molar_grid::{CollisionBuffer, DensityField, GridError, GridPlacement, ToughnessField, VoxelRegion};
use rayon::prelude::*;

use crate::tool::{segment_distance, Tool};
use crate::Result;

/// Density at or below which a voxel counts as empty.
pub const SOLID_THRESHOLD: f32 = 0.0;

/// Lowest density a carve can leave behind.
pub const MIN_DENSITY: f32 = -1.0;

/// The grids one carve reads and writes.
pub struct CarveGrids<'a> {
    /// Density, lowered in place.
    pub density: &'a mut DensityField,
    /// Per-voxel resistance.
    pub toughness: &'a ToughnessField,
    /// Set to 1 where the tool met solid material.
    pub collision: &'a mut CollisionBuffer,
}

/// What one carve did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarveStats {
    /// Voxels scanned for the tool.
    pub region: VoxelRegion,
    /// Voxels whose density went down.
    pub lowered: usize,
    /// Voxels flagged in the collision buffer.
    pub flagged: usize,
}

/// Remove material around `tool`.
///
/// Inside the influence volume a voxel at signed distance `d < 0` loses
/// `power * (-d / range) / (1 + toughness)`, floored at [`MIN_DENSITY`].
/// Density never goes up. Voxels that were solid before the tool reached
/// them get a collision flag.
pub fn carve(tool: &Tool, placement: &GridPlacement, grids: CarveGrids<'_>) -> Result<CarveStats> {
    tool.validate()?;
    let dims = placement.dims;
    for other in [grids.density.dims(), grids.toughness.dims(), grids.collision.dims()] {
        if other != dims {
            return Err(GridError::DimsMismatch(dims, other).into());
        }
    }

    let region = tool.region(placement);
    let slice = dims.slice_len();
    let toughness = grids.toughness.as_slice();
    let (a, b) = tool.tips();
    let range = tool.range;
    let power = tool.power;

    let (lowered, flagged) = grids
        .density
        .as_mut_slice()
        .par_chunks_mut(slice)
        .zip(grids.collision.as_mut_slice().par_chunks_mut(slice))
        .enumerate()
        .filter(|(z, _)| *z >= region.min[2] && *z <= region.max[2])
        .map(|(z, (density, collision))| {
            let mut lowered = 0;
            let mut flagged = 0;
            for y in region.min[1]..=region.max[1] {
                for x in region.min[0]..=region.max[0] {
                    let p = placement.voxel_center(x, y, z);
                    let sdf = segment_distance(&p, &a, &b) - range;
                    if sdf >= 0.0 {
                        continue;
                    }
                    let i = x + y * dims.x;
                    let old = density[i];
                    if old > SOLID_THRESHOLD {
                        collision[i] = 1.0;
                        flagged += 1;
                    }
                    if old > MIN_DENSITY {
                        let proximity = -sdf / range;
                        let resist = 1.0 + toughness[z * slice + i].max(0.0);
                        let new = (old - power * proximity / resist).max(MIN_DENSITY);
                        if new < old {
                            density[i] = new;
                            lowered += 1;
                        }
                    }
                }
            }
            (lowered, flagged)
        })
        .reduce(|| (0, 0), |l, r| (l.0 + r.0, l.1 + r.1));

    log::debug!(
        "carved {:?} tool at {:?}: {lowered} lowered, {flagged} flagged",
        tool.kind,
        tool.position()
    );
    Ok(CarveStats {
        region,
        lowered,
        flagged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use molar_grid::{CubeSource, GridDims, VoxelSource};
    use molar_math::{Point3, Transform};

    struct Fixture {
        placement: GridPlacement,
        density: DensityField,
        toughness: ToughnessField,
        collision: CollisionBuffer,
    }

    impl Fixture {
        fn new(n: usize, toughness: f32) -> Self {
            let dims = GridDims::cube(n);
            Self {
                placement: GridPlacement::centered(Point3::origin(), 0.05, dims),
                density: CubeSource.density(dims),
                toughness: ToughnessField::filled(dims, toughness),
                collision: CollisionBuffer::filled(dims, 0.0),
            }
        }

        fn carve(&mut self, tool: &Tool) -> CarveStats {
            carve(
                tool,
                &self.placement,
                CarveGrids {
                    density: &mut self.density,
                    toughness: &self.toughness,
                    collision: &mut self.collision,
                },
            )
            .unwrap()
        }
    }

    #[test]
    fn test_sphere_removes_at_centre() {
        let mut f = Fixture::new(16, 0.0);
        let centre = f.placement.voxel_center(8, 8, 8);
        let stats = f.carve(&Tool::sphere(centre, 1.0));
        // Full power at the centre takes 1 down to 0.
        assert_relative_eq!(*f.density.get(8, 8, 8), 0.0, epsilon = 1e-6);
        assert!(stats.lowered > 1);
        assert_eq!(*f.collision.get(8, 8, 8), 1.0);
        // Beyond the range nothing changes.
        assert_eq!(*f.density.get(8, 8, 12), 1.0);
        assert_eq!(*f.collision.get(8, 8, 12), 0.0);
    }

    #[test]
    fn test_toughness_slows_removal() {
        let mut soft = Fixture::new(16, 0.0);
        let mut hard = Fixture::new(16, 3.0);
        let centre = soft.placement.voxel_center(8, 8, 8);
        let tool = Tool::sphere(centre, 1.0);
        soft.carve(&tool);
        hard.carve(&tool);
        assert_relative_eq!(*hard.density.get(8, 8, 8), 0.75, epsilon = 1e-6);
        assert!(*hard.density.get(8, 8, 8) > *soft.density.get(8, 8, 8));
    }

    #[test]
    fn test_repeated_carve_is_monotonic() {
        let mut f = Fixture::new(16, 0.5);
        let tool = Tool::sphere(f.placement.voxel_center(7, 9, 8), 0.7);
        let mut previous = f.density.clone();
        for _ in 0..6 {
            f.carve(&tool);
            for (now, before) in f.density.as_slice().iter().zip(previous.as_slice()) {
                assert!(now <= before);
                assert!(*now >= MIN_DENSITY);
            }
            previous = f.density.clone();
        }
        assert_eq!(*f.density.get(7, 9, 8), MIN_DENSITY);
    }

    #[test]
    fn test_empty_voxels_do_not_collide() {
        let mut f = Fixture::new(16, 0.0);
        let corner = f.placement.voxel_center(0, 0, 0);
        let stats = f.carve(&Tool::sphere(corner, 1.0).with_range(0.03));
        assert_eq!(stats.flagged, 0);
        assert_eq!(f.collision.count_above(0.0), 0);
    }

    #[test]
    fn test_capsule_carves_along_axis() {
        let mut f = Fixture::new(24, 0.0);
        let c = f.placement.voxel_center(12, 12, 12);
        let tool = Tool::capsule(Transform::translation(c.x, c.y, c.z), 1.0).with_range(0.04);
        f.carve(&tool);
        // Tips sit 0.03 up and down y, so the neighbours one voxel away on
        // y are reached but the ones on x are not.
        assert!(*f.density.get(12, 13, 12) < 0.9);
        assert!(*f.density.get(12, 11, 12) < 0.9);
        assert_eq!(*f.density.get(13, 12, 12), 1.0);
    }

    #[test]
    fn test_tool_outside_grid_is_clamped() {
        let mut f = Fixture::new(8, 0.0);
        let before = f.density.clone();
        let stats = f.carve(&Tool::sphere(Point3::new(10.0, 10.0, 10.0), 1.0));
        assert_eq!(stats.region.voxel_count(), 1);
        assert_eq!(stats.lowered, 0);
        assert_eq!(f.density, before);
    }

    #[test]
    fn test_rejects_mismatched_grids() {
        let mut f = Fixture::new(8, 0.0);
        let toughness = ToughnessField::filled(GridDims::cube(4), 0.0);
        let result = carve(
            &Tool::sphere(Point3::origin(), 1.0),
            &f.placement,
            CarveGrids {
                density: &mut f.density,
                toughness: &toughness,
                collision: &mut f.collision,
            },
        );
        assert!(result.is_err());
    }
}
