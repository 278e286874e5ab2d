//! Weighted 27-neighbourhood blur.

use molar_grid::DensityField;
use rayon::prelude::*;

/// Divisor of the blur. The weights themselves sum to 46 (19 voxels
/// weigh 2, 8 corners weigh 1), so every pass also scales a uniform
/// region by 46/54.
const DIVISOR: f32 = 54.0;

/// Blur the interior of `density` `passes` times.
///
/// Neighbours that share at least one coordinate with the centre (faces,
/// edges and the centre itself) weigh 2, the eight corners weigh 1, and the
/// sum is divided by 54. Border voxels are never written and keep `-1`, so
/// the grid stays closed. Passes alternate between two buffers.
pub fn smooth(density: DensityField, passes: usize) -> DensityField {
    if passes == 0 {
        return density;
    }
    let mut front = density;
    let mut back = DensityField::filled(front.dims(), -1.0);
    for _ in 0..passes {
        blur_into(&front, &mut back);
        std::mem::swap(&mut front, &mut back);
    }
    front
}

fn blur_into(src: &DensityField, dst: &mut DensityField) {
    let dims = src.dims();
    if dims.x < 3 || dims.y < 3 || dims.z < 3 {
        return;
    }
    let slice = dims.slice_len();
    let data = src.as_slice();
    dst.as_mut_slice()
        .par_chunks_mut(slice)
        .enumerate()
        .filter(|(z, _)| *z >= 1 && *z + 1 < dims.z)
        .for_each(|(z, out)| {
            for y in 1..dims.y - 1 {
                for x in 1..dims.x - 1 {
                    let mut sum = 0.0;
                    for k in 0..3 {
                        for j in 0..3 {
                            for i in 0..3 {
                                let v = data[dims.index(x + i - 1, y + j - 1, z + k - 1)];
                                let w = if i == 1 || j == 1 || k == 1 { 2.0 } else { 1.0 };
                                sum += v * w;
                            }
                        }
                    }
                    out[x + y * dims.x] = sum / DIVISOR;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use molar_grid::GridDims;

    #[test]
    fn test_uniform_region_scales() {
        let dims = GridDims::cube(5);
        let field = DensityField::filled(dims, 0.75);
        let out = smooth(field, 1);
        assert_relative_eq!(*out.get(2, 2, 2), 0.75 * 46.0 / 54.0, epsilon = 1e-6);
        assert_eq!(*out.get(0, 2, 2), -1.0);
    }

    #[test]
    fn test_single_voxel_spreads() {
        let dims = GridDims::cube(5);
        let mut field = DensityField::filled(dims, 0.0);
        field.set(2, 2, 2, 54.0);
        let out = smooth(field, 1);
        assert_relative_eq!(*out.get(2, 2, 2), 2.0);
        assert_relative_eq!(*out.get(1, 2, 2), 2.0);
        assert_relative_eq!(*out.get(1, 1, 2), 2.0);
        assert_relative_eq!(*out.get(1, 1, 1), 1.0);
    }

    #[test]
    fn test_even_and_odd_passes() {
        let dims = GridDims::cube(6);
        let mut field = DensityField::filled(dims, -1.0);
        for z in 2..4 {
            for y in 2..4 {
                for x in 2..4 {
                    field.set(x, y, z, 1.0);
                }
            }
        }
        let zero = smooth(field.clone(), 0);
        assert_eq!(zero, field);
        let one = smooth(field.clone(), 1);
        let two = smooth(field.clone(), 2);
        let two_again = smooth(one.clone(), 1);
        assert_eq!(two, two_again);
        assert_ne!(one, two);
    }
}
