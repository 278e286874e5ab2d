//! Grid dimensions and the canonical flattening order.

use std::fmt;

use molar_math::Vec3;

use crate::{GridError, Result};

/// Number of voxels along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridDims {
    /// Voxels along x.
    pub x: usize,
    /// Voxels along y.
    pub y: usize,
    /// Voxels along z.
    pub z: usize,
}

impl GridDims {
    /// Create dimensions from per-axis voxel counts.
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Same count along every axis.
    pub const fn cube(n: usize) -> Self {
        Self { x: n, y: n, z: n }
    }

    /// Check that every axis is non-empty and the volume is addressable
    /// by both the host (`usize`) and the persisted layout (`i32` per axis).
    pub fn validate(&self) -> Result<()> {
        if self.x == 0 || self.y == 0 || self.z == 0 {
            return Err(GridError::InvalidDims(format!("{self} has an empty axis")));
        }
        let max = i32::MAX as usize;
        if self.x > max || self.y > max || self.z > max {
            return Err(GridError::InvalidDims(format!("{self} exceeds i32 range")));
        }
        self.checked_volume()
            .ok_or_else(|| GridError::InvalidDims(format!("{self} volume overflows")))?;
        Ok(())
    }

    /// Total voxel count, `None` on overflow.
    pub fn checked_volume(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    /// Total voxel count.
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Flattened index of voxel `(x, y, z)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.x + z * self.x * self.y
    }

    /// Inverse of [`GridDims::index`].
    #[inline]
    pub fn coords(&self, index: usize) -> [usize; 3] {
        let x = index % self.x;
        let y = (index / self.x) % self.y;
        let z = index / (self.x * self.y);
        [x, y, z]
    }

    /// True if the signed coordinate lies inside the grid.
    pub fn contains(&self, x: i64, y: i64, z: i64) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.x
            && (y as usize) < self.y
            && (z as usize) < self.z
    }

    /// True if the voxel touches the outer layer of the grid.
    pub fn is_border(&self, x: usize, y: usize, z: usize) -> bool {
        x == 0 || y == 0 || z == 0 || x + 1 == self.x || y + 1 == self.y || z + 1 == self.z
    }

    /// Voxels in one z-slice.
    pub fn slice_len(&self) -> usize {
        self.x * self.y
    }

    /// Dimensions as a float vector.
    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Dimensions as `u32`, the layout the compute shaders expect.
    pub fn to_u32(&self) -> [u32; 3] {
        [self.x as u32, self.y as u32, self.z as u32]
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_x_fastest() {
        let dims = GridDims::new(3, 4, 5);
        assert_eq!(dims.index(0, 0, 0), 0);
        assert_eq!(dims.index(1, 0, 0), 1);
        assert_eq!(dims.index(0, 1, 0), 3);
        assert_eq!(dims.index(0, 0, 1), 12);
        assert_eq!(dims.index(2, 3, 4), dims.volume() - 1);
    }

    #[test]
    fn test_coords_inverts_index() {
        let dims = GridDims::new(7, 3, 5);
        for i in 0..dims.volume() {
            let [x, y, z] = dims.coords(i);
            assert_eq!(dims.index(x, y, z), i);
        }
    }

    #[test]
    fn test_validate() {
        assert!(GridDims::new(1, 1, 1).validate().is_ok());
        assert!(GridDims::new(0, 4, 4).validate().is_err());
        assert!(GridDims::new(usize::MAX, 2, 2).validate().is_err());
    }

    #[test]
    fn test_contains_and_border() {
        let dims = GridDims::cube(4);
        assert!(dims.contains(3, 0, 2));
        assert!(!dims.contains(-1, 0, 0));
        assert!(!dims.contains(0, 4, 0));
        assert!(dims.is_border(0, 2, 2));
        assert!(dims.is_border(2, 3, 2));
        assert!(!dims.is_border(1, 2, 2));
    }

    #[test]
    fn test_display() {
        assert_eq!(GridDims::new(2, 3, 4).to_string(), "2x3x4");
    }
}
