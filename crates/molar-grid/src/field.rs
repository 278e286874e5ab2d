//! Generic dense grid storage.

use rayon::prelude::*;

use crate::{GridDims, GridError, Result};

/// Texture coordinate stored per voxel.
pub type TexCoord = [f32; 2];

/// Signed density: positive inside the solid, negative empty or carved.
pub type DensityField = Field<f32>;

/// Per-voxel resistance to carving.
pub type ToughnessField = Field<f32>;

/// Per-voxel texture coordinates from the source mesh.
pub type TexCoordField = Field<TexCoord>;

/// Per-voxel "a tool touched solid here this step" flags.
pub type CollisionBuffer = Field<f32>;

/// A dense 3D grid of values in canonical flattening order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<T> {
    dims: GridDims,
    data: Vec<T>,
}

impl<T: Clone> Field<T> {
    /// Grid with every voxel set to `value`.
    pub fn filled(dims: GridDims, value: T) -> Self {
        Self {
            dims,
            data: vec![value; dims.volume()],
        }
    }

    /// Overwrite every voxel with `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Field<T> {
    /// Wrap flattened data. Fails if the length does not match the volume.
    pub fn from_vec(dims: GridDims, data: Vec<T>) -> Result<Self> {
        if data.len() != dims.volume() {
            return Err(GridError::LengthMismatch {
                expected: dims.volume(),
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Grid dimensions.
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Number of voxels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-volume grid.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at voxel `(x, y, z)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> &T {
        &self.data[self.dims.index(x, y, z)]
    }

    /// Mutable value at voxel `(x, y, z)`.
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> &mut T {
        let i = self.dims.index(x, y, z);
        &mut self.data[i]
    }

    /// Set voxel `(x, y, z)`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) {
        let i = self.dims.index(x, y, z);
        self.data[i] = value;
    }

    /// Flattened data.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable flattened data.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Fail unless `other` has the same dimensions.
    pub fn ensure_same_dims<U>(&self, other: &Field<U>) -> Result<()> {
        if self.dims != other.dims {
            return Err(GridError::DimsMismatch(self.dims, other.dims));
        }
        Ok(())
    }
}

impl<T: Send + Sync> Field<T> {
    /// Build a field by evaluating `f(x, y, z)` for every voxel in parallel.
    pub fn from_fn<F>(dims: GridDims, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> T + Sync + Send,
        T: Default + Clone,
    {
        let mut data = vec![T::default(); dims.volume()];
        data.par_iter_mut().enumerate().for_each(|(i, v)| {
            let [x, y, z] = dims.coords(i);
            *v = f(x, y, z);
        });
        Self { dims, data }
    }

    /// Map every value into a new field of the same dimensions.
    pub fn map<U, F>(&self, f: F) -> Field<U>
    where
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        Field {
            dims: self.dims,
            data: self.data.par_iter().map(f).collect(),
        }
    }
}

impl Field<f32> {
    /// Number of voxels strictly above `threshold`.
    pub fn count_above(&self, threshold: f32) -> usize {
        self.data.par_iter().filter(|&&v| v > threshold).count()
    }

    /// Smallest and largest value, or `None` for an empty grid.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        let dims = GridDims::new(2, 2, 2);
        assert!(Field::from_vec(dims, vec![0.0f32; 8]).is_ok());
        let err = Field::from_vec(dims, vec![0.0f32; 7]).unwrap_err();
        assert!(matches!(
            err,
            GridError::LengthMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_get_set_use_canonical_order() {
        let dims = GridDims::new(3, 2, 2);
        let mut field = Field::filled(dims, 0u8);
        field.set(2, 1, 1, 9);
        assert_eq!(*field.get(2, 1, 1), 9);
        assert_eq!(field.as_slice()[2 + 3 + 6], 9);
    }

    #[test]
    fn test_from_fn_visits_every_voxel() {
        let dims = GridDims::new(4, 3, 2);
        let field = Field::from_fn(dims, |x, y, z| dims.index(x, y, z));
        for (i, &v) in field.as_slice().iter().enumerate() {
            assert_eq!(i, v);
        }
    }

    #[test]
    fn test_count_above_and_min_max() {
        let dims = GridDims::cube(2);
        let field = Field::from_vec(dims, vec![-1.0, 1.0, 0.5, 0.0, -0.2, 0.9, 0.1, -1.0]).unwrap();
        assert_eq!(field.count_above(0.0), 4);
        assert_eq!(field.min_max(), Some((-1.0, 1.0)));
    }

    #[test]
    fn test_ensure_same_dims() {
        let a = Field::filled(GridDims::cube(2), 0.0f32);
        let b = Field::filled(GridDims::cube(3), [0.0f32; 2]);
        assert!(a.ensure_same_dims(&a).is_ok());
        assert!(matches!(a.ensure_same_dims(&b), Err(GridError::DimsMismatch(_, _))));
    }
}
