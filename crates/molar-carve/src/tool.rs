//! Carving tool descriptors.

use molar_grid::{GridPlacement, VoxelRegion};
use molar_math::{Point3, Transform, Vec3};

use crate::{CarveError, Result};

/// Default influence radius of a sphere tool, world units.
pub const DEFAULT_SPHERE_RANGE: f32 = 0.125;
/// Default influence radius of a capsule tool, world units.
pub const DEFAULT_CAPSULE_RANGE: f32 = 0.1;
/// Default distance from a capsule's centre to each tip, in the tool's
/// local space before scaling.
pub const DEFAULT_CAPSULE_HALF_LENGTH: f32 = 0.03;

/// Shape of a tool's removal volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolKind {
    /// A ball around the tool position.
    Sphere,
    /// A capsule along the tool's local y axis.
    Capsule {
        /// Local offset of each tip from the tool centre.
        half_length: f32,
    },
}

/// One active tool for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tool {
    /// Removal shape.
    pub kind: ToolKind,
    /// World transform of the tool.
    pub transform: Transform,
    /// Density removed per step at the tool centre, before toughness.
    pub power: f32,
    /// Influence radius in world units.
    pub range: f32,
}

impl Tool {
    /// A sphere tool at `position`.
    pub fn sphere(position: Point3, power: f32) -> Self {
        Self {
            kind: ToolKind::Sphere,
            transform: Transform::translation(position.x, position.y, position.z),
            power,
            range: DEFAULT_SPHERE_RANGE,
        }
    }

    /// A capsule tool with the given world transform.
    pub fn capsule(transform: Transform, power: f32) -> Self {
        Self {
            kind: ToolKind::Capsule {
                half_length: DEFAULT_CAPSULE_HALF_LENGTH,
            },
            transform,
            power,
            range: DEFAULT_CAPSULE_RANGE,
        }
    }

    /// Replace the influence radius.
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    /// World position of the tool centre.
    pub fn position(&self) -> Point3 {
        self.transform.origin()
    }

    /// Check that the parameters describe a usable tool.
    pub fn validate(&self) -> Result<()> {
        if !(self.range.is_finite() && self.range > 0.0) {
            return Err(CarveError::InvalidRange(self.range));
        }
        if !(self.power.is_finite() && self.power >= 0.0) {
            return Err(CarveError::InvalidPower(self.power));
        }
        if let ToolKind::Capsule { half_length } = self.kind {
            if !(half_length.is_finite() && half_length >= 0.0) {
                return Err(CarveError::InvalidHalfLength(half_length));
            }
        }
        Ok(())
    }

    /// End points of the removal segment in world space.
    ///
    /// A sphere is a segment of zero length. A capsule's tips sit at local
    /// `(0, ±half_length / scale_x, 0)`, so after the transform applies its
    /// scale the tips keep their length regardless of the tool's size.
    pub fn tips(&self) -> (Point3, Point3) {
        match self.kind {
            ToolKind::Sphere => {
                let p = self.position();
                (p, p)
            }
            ToolKind::Capsule { half_length } => {
                let scale_x = self.transform.apply_vec(&Vec3::x()).norm();
                let h = if scale_x > 0.0 {
                    half_length / scale_x
                } else {
                    half_length
                };
                (
                    self.transform.apply_point(&Point3::new(0.0, h, 0.0)),
                    self.transform.apply_point(&Point3::new(0.0, -h, 0.0)),
                )
            }
        }
    }

    /// Signed distance from `p` to the influence volume, negative inside.
    pub fn signed_distance(&self, p: &Point3) -> f32 {
        let (a, b) = self.tips();
        segment_distance(p, &a, &b) - self.range
    }

    /// Voxels that may lie inside the influence volume.
    pub fn region(&self, placement: &GridPlacement) -> VoxelRegion {
        let (a, b) = self.tips();
        let min = Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        placement.region_around(&min, &max, self.range + placement.voxel_size)
    }
}

/// Distance from `p` to the segment `[a, b]`.
pub fn segment_distance(p: &Point3, a: &Point3, b: &Point3) -> f32 {
    let pa = p - a;
    let ba = b - a;
    let len_sq = ba.norm_squared();
    let h = if len_sq < 1e-12 {
        0.0
    } else {
        (pa.dot(&ba) / len_sq).clamp(0.0, 1.0)
    };
    (pa - ba * h).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use molar_grid::GridDims;
    use molar_math::Rotation;

    #[test]
    fn test_sphere_signed_distance() {
        let tool = Tool::sphere(Point3::new(1.0, 0.0, 0.0), 1.0);
        assert_relative_eq!(tool.signed_distance(&Point3::new(1.0, 0.0, 0.0)), -0.125);
        assert_relative_eq!(tool.signed_distance(&Point3::new(1.5, 0.0, 0.0)), 0.375);
    }

    #[test]
    fn test_capsule_tips_ignore_scale() {
        let t = Transform::from_trs(
            Vec3::new(0.0, 1.0, 0.0),
            Rotation::identity(),
            Vec3::repeat(4.0),
        );
        let (a, b) = Tool::capsule(t, 1.0).tips();
        assert_relative_eq!(a, Point3::new(0.0, 1.03, 0.0), epsilon = 1e-6);
        assert_relative_eq!(b, Point3::new(0.0, 0.97, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_capsule_tips_follow_rotation() {
        let rot = Rotation::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let t = Transform::from_trs(Vec3::zeros(), rot, Vec3::repeat(1.0));
        let (a, b) = Tool::capsule(t, 1.0).tips();
        assert_relative_eq!(a, Point3::new(-0.03, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(b, Point3::new(0.03, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_segment_distance() {
        let a = Point3::new(0.0, -1.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(segment_distance(&Point3::new(2.0, 0.5, 0.0), &a, &b), 2.0);
        assert_relative_eq!(segment_distance(&Point3::new(0.0, 3.0, 0.0), &a, &b), 2.0);
        assert_relative_eq!(segment_distance(&Point3::new(3.0, 0.0, 0.0), &a, &a), 3.0);
    }

    #[test]
    fn test_validate() {
        assert!(Tool::sphere(Point3::origin(), 1.0).validate().is_ok());
        assert!(matches!(
            Tool::sphere(Point3::origin(), 1.0).with_range(0.0).validate(),
            Err(CarveError::InvalidRange(_))
        ));
        assert!(matches!(
            Tool::sphere(Point3::origin(), f32::NAN).validate(),
            Err(CarveError::InvalidPower(_))
        ));
    }

    #[test]
    fn test_region_is_clamped() {
        let placement = GridPlacement::new(Point3::origin(), 0.1, GridDims::cube(10));
        let far = Tool::sphere(Point3::new(50.0, 50.0, 50.0), 1.0);
        let r = far.region(&placement);
        assert_eq!(r.min, [9, 9, 9]);
        assert_eq!(r.max, [9, 9, 9]);

        let inside = Tool::sphere(Point3::new(0.5, 0.5, 0.5), 1.0);
        let r = inside.region(&placement);
        assert!(r.contains(5, 5, 5));
        assert!(r.min[0] <= 3 && r.max[0] >= 7);
    }
}
