//! Mapping between world space and voxel indices.

use molar_math::{Point3, Vec3};

use crate::GridDims;

/// Where a grid sits in the world.
///
/// Voxel `(i, j, k)` is centred at `origin + (i, j, k) * voxel_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPlacement {
    /// World position of voxel `(0, 0, 0)`.
    pub origin: Point3,
    /// Edge length of one voxel in world units.
    pub voxel_size: f32,
    /// Grid dimensions.
    pub dims: GridDims,
}

impl GridPlacement {
    /// Placement with voxel `(0, 0, 0)` at `origin`.
    pub fn new(origin: Point3, voxel_size: f32, dims: GridDims) -> Self {
        Self {
            origin,
            voxel_size,
            dims,
        }
    }

    /// Placement centred on an entity at `position`.
    pub fn centered(position: Point3, voxel_size: f32, dims: GridDims) -> Self {
        let origin = position - dims.to_vec3() * (0.5 * voxel_size);
        Self::new(origin, voxel_size, dims)
    }

    /// World position of a voxel centre.
    pub fn voxel_center(&self, x: usize, y: usize, z: usize) -> Point3 {
        self.origin + Vec3::new(x as f32, y as f32, z as f32) * self.voxel_size
    }

    /// Nearest voxel to a world position, clamped into the grid.
    ///
    /// Positions outside the grid snap to the closest border voxel; tools
    /// routinely leave the solid's extent.
    pub fn world_to_index(&self, p: &Point3) -> [usize; 3] {
        let local = (p - self.origin) / self.voxel_size;
        [
            clamp_axis(local.x, self.dims.x),
            clamp_axis(local.y, self.dims.y),
            clamp_axis(local.z, self.dims.z),
        ]
    }

    /// Voxels whose centres may lie within `radius` of the box
    /// `[min, max]`, clamped into the grid.
    pub fn region_around(&self, min: &Point3, max: &Point3, radius: f32) -> VoxelRegion {
        let pad = Vec3::repeat(radius);
        let lo = self.world_to_index(&(min - pad));
        let hi = self.world_to_index(&(max + pad));
        VoxelRegion { min: lo, max: hi }
    }
}

fn clamp_axis(v: f32, n: usize) -> usize {
    let r = v.round();
    if !(r > 0.0) {
        return 0;
    }
    (r as usize).min(n.saturating_sub(1))
}

/// An inclusive box of voxel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelRegion {
    /// Lowest index on each axis.
    pub min: [usize; 3],
    /// Highest index on each axis, inclusive.
    pub max: [usize; 3],
}

impl VoxelRegion {
    /// Region covering the whole grid.
    pub fn full(dims: GridDims) -> Self {
        Self {
            min: [0, 0, 0],
            max: [
                dims.x.saturating_sub(1),
                dims.y.saturating_sub(1),
                dims.z.saturating_sub(1),
            ],
        }
    }

    /// A single voxel.
    pub fn single(index: [usize; 3]) -> Self {
        Self {
            min: index,
            max: index,
        }
    }

    /// Number of voxels in the region.
    pub fn voxel_count(&self) -> usize {
        (0..3).map(|a| self.max[a] + 1 - self.min[a]).product()
    }

    /// True if `(x, y, z)` lies inside.
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        let p = [x, y, z];
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }

    /// Iterate `(x, y, z)` with x varying fastest.
    pub fn iter(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (self.min[2]..=self.max[2]).flat_map(move |z| {
            (self.min[1]..=self.max[1])
                .flat_map(move |y| (self.min[0]..=self.max[0]).map(move |x| [x, y, z]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centered_placement() {
        let dims = GridDims::cube(10);
        let p = GridPlacement::centered(Point3::new(1.0, 1.0, 1.0), 0.5, dims);
        assert_relative_eq!(p.origin, Point3::new(-1.5, -1.5, -1.5));
        assert_eq!(p.world_to_index(&Point3::new(1.0, 1.0, 1.0)), [5, 5, 5]);
    }

    #[test]
    fn test_world_to_index_rounds_to_nearest() {
        let p = GridPlacement::new(Point3::origin(), 1.0, GridDims::cube(8));
        assert_eq!(p.world_to_index(&Point3::new(2.4, 2.6, 3.0)), [2, 3, 3]);
    }

    #[test]
    fn test_world_to_index_clamps() {
        let p = GridPlacement::new(Point3::origin(), 1.0, GridDims::new(4, 5, 6));
        assert_eq!(p.world_to_index(&Point3::new(-10.0, 100.0, 5.4)), [0, 4, 5]);
        assert_eq!(p.world_to_index(&Point3::new(f32::NAN, 0.0, 0.0)), [0, 0, 0]);
    }

    #[test]
    fn test_voxel_center_roundtrip() {
        let p = GridPlacement::centered(Point3::new(0.2, -0.3, 0.0), 0.05, GridDims::new(20, 30, 10));
        let c = p.voxel_center(7, 11, 3);
        assert_eq!(p.world_to_index(&c), [7, 11, 3]);
    }

    #[test]
    fn test_region_iteration() {
        let region = VoxelRegion {
            min: [1, 2, 3],
            max: [2, 3, 3],
        };
        let voxels: Vec<_> = region.iter().collect();
        assert_eq!(voxels, vec![[1, 2, 3], [2, 2, 3], [1, 3, 3], [2, 3, 3]]);
        assert_eq!(region.voxel_count(), 4);
        assert!(region.contains(2, 3, 3));
        assert!(!region.contains(0, 3, 3));
    }

    #[test]
    fn test_single_voxel_region() {
        let region = VoxelRegion::single([3, 0, 5]);
        assert_eq!(region.voxel_count(), 1);
        assert_eq!(region.iter().collect::<Vec<_>>(), vec![[3, 0, 5]]);
        assert!(region.contains(3, 0, 5));
        assert!(!region.contains(3, 1, 5));
    }

    #[test]
    fn test_region_around_is_clamped() {
        let p = GridPlacement::new(Point3::origin(), 1.0, GridDims::cube(8));
        let c = Point3::new(0.0, 4.0, 7.0);
        let region = p.region_around(&c, &c, 2.0);
        assert_eq!(region.min, [0, 2, 5]);
        assert_eq!(region.max, [2, 6, 7]);
    }
}
