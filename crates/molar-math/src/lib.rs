#![warn(missing_docs)]

//! Math types for the molar voxel carving engine.
//!
//! Thin wrappers around nalgebra in single precision, matching the layout
//! of the GPU buffers: points, vectors, an affine tool transform and an
//! axis-aligned bounding box.

use nalgebra::{Matrix4, UnitQuaternion, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f32>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// A 2D vector, used for texture coordinates.
pub type Vec2 = Vector2<f32>;

/// A rotation in 3D space.
pub type Rotation = UnitQuaternion<f32>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f32>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f32, dy: f32, dz: f32) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vec3::new(dx, dy, dz)),
        }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)),
        }
    }

    /// Rotation by a unit quaternion.
    pub fn rotation(rotation: &Rotation) -> Self {
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Build a transform from translation, rotation and scale.
    ///
    /// Points are scaled first, then rotated, then translated, the usual
    /// order for scene-graph node transforms.
    pub fn from_trs(translation: Vec3, rotation: Rotation, scale: Vec3) -> Self {
        Self::translation(translation.x, translation.y, translation.z)
            .then(&Self::rotation(&rotation))
            .then(&Self::scale(scale.x, scale.y, scale.z))
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// The translation part of the transform.
    pub fn origin(&self) -> Point3 {
        Point3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from its center and full size.
    pub fn from_center_size(center: Point3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Smallest AABB containing all `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the longest side.
    pub fn max_extent(&self) -> f32 {
        let s = self.size();
        s.x.max(s.y).max(s.z)
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Grow the box by `amount` in every direction.
    pub fn expanded(&self, amount: f32) -> Self {
        let d = Vec3::repeat(amount);
        Self {
            min: self.min - d,
            max: self.max + d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(t.apply_point(&p), p);
    }

    #[test]
    fn test_trs_order() {
        // Scale x2, rotate 90° about Z, then translate.
        let rot = Rotation::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2);
        let t = Transform::from_trs(Vec3::new(10.0, 0.0, 0.0), rot, Vec3::repeat(2.0));
        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 2.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(t.origin(), Point3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_apply_vec_ignores_translation() {
        let t = Transform::translation(5.0, 5.0, 5.0);
        let v = t.apply_vec(&Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(v, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::translation(1.0, -2.0, 3.0).then(&Transform::scale(2.0, 4.0, 0.5));
        let inv = t.inverse().unwrap();
        let p = Point3::new(0.3, 0.7, -1.1);
        assert_relative_eq!(inv.apply_point(&t.apply_point(&p)), p, epsilon = 1e-5);
    }

    #[test]
    fn test_aabb_from_points() {
        let pts = [
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(-2.0, 3.0, 0.5),
            Point3::new(0.0, 0.0, 4.0),
        ];
        let aabb = Aabb3::from_points(&pts);
        assert_eq!(aabb.min, Point3::new(-2.0, -1.0, 0.0));
        assert_eq!(aabb.max, Point3::new(1.0, 3.0, 4.0));
        assert_relative_eq!(aabb.max_extent(), 4.0);
        assert!(!aabb.is_empty());
        assert!(Aabb3::empty().is_empty());
    }

    #[test]
    fn test_aabb_overlap_touching() {
        let a = Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb3::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let c = Aabb3::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.expanded(0.5).overlaps(&c));
    }
}
