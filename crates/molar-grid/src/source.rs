//! Procedural providers of initial voxel data.
//!
//! Alternatives to voxelizing a mesh: useful for tests, benchmarks and
//! quick scenes where no tooth mesh is at hand.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{DensityField, GridDims};

/// Produces an initial density field for a grid of a given size.
pub trait VoxelSource {
    /// Density for every voxel of a `dims` grid; positive values are solid.
    fn density(&self, dims: GridDims) -> DensityField;
}

/// A ball filling the grid, with signed distance in voxel units.
#[derive(Debug, Clone, Copy, Default)]
pub struct SphereSource;

impl VoxelSource for SphereSource {
    fn density(&self, dims: GridDims) -> DensityField {
        let radius = (dims.x.min(dims.y).min(dims.z) as f32 - 1.0) / 2.0;
        let c = dims.to_vec3() * 0.5 - molar_math::Vec3::repeat(0.5);
        DensityField::from_fn(dims, move |x, y, z| {
            let d = molar_math::Vec3::new(x as f32, y as f32, z as f32) - c;
            radius - d.norm()
        })
    }
}

/// A solid block with a one-voxel empty border.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeSource;

impl VoxelSource for CubeSource {
    fn density(&self, dims: GridDims) -> DensityField {
        DensityField::from_fn(dims, move |x, y, z| {
            if dims.is_border(x, y, z) {
                -1.0
            } else {
                1.0
            }
        })
    }
}

/// Uniform noise in `[-1, 1)`, reproducible from a seed.
#[derive(Debug, Clone, Copy)]
pub struct RandomFillSource {
    /// RNG seed.
    pub seed: u64,
}

impl VoxelSource for RandomFillSource {
    fn density(&self, dims: GridDims) -> DensityField {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let data = (0..dims.volume()).map(|_| rng.gen_range(-1.0..1.0)).collect();
        DensityField::from_vec(dims, data).unwrap_or_else(|_| DensityField::filled(dims, -1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_source_sign() {
        let dims = GridDims::cube(9);
        let field = SphereSource.density(dims);
        assert!(*field.get(4, 4, 4) > 3.0);
        assert!(*field.get(0, 0, 0) < 0.0);
        assert!(*field.get(8, 4, 4) < 1.0);
    }

    #[test]
    fn test_cube_source_has_empty_border() {
        let dims = GridDims::new(4, 5, 6);
        let field = CubeSource.density(dims);
        assert_eq!(field.count_above(0.0), 2 * 3 * 4);
        assert_eq!(*field.get(0, 2, 2), -1.0);
        assert_eq!(*field.get(1, 1, 1), 1.0);
    }

    #[test]
    fn test_random_fill_is_seeded() {
        let dims = GridDims::cube(5);
        let a = RandomFillSource { seed: 7 }.density(dims);
        let b = RandomFillSource { seed: 7 }.density(dims);
        let c = RandomFillSource { seed: 8 }.density(dims);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let (lo, hi) = a.min_max().unwrap();
        assert!(lo >= -1.0 && hi < 1.0);
    }
}
