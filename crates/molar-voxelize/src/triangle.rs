//! Exact triangle / axis-aligned box overlap.
//!
//! Separating axis test after Akenine-Möller: nine cross products of the
//! triangle edges with the box axes, the three box face normals, and the
//! triangle plane.

use molar_math::{Aabb3, Point3, Vec3};

/// A triangle prepared for voxelization.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex.
    pub a: Point3,
    /// Second vertex.
    pub b: Point3,
    /// Third vertex.
    pub c: Point3,
    /// Bounding box of the three vertices.
    pub bounds: Aabb3,
    /// True if the triangle faces against the scan direction.
    pub front_facing: bool,
}

impl Triangle {
    /// Build a triangle and classify it against `scan_dir`.
    ///
    /// Front-facing means the winding normal `(b - a) x (c - a)` points
    /// against (or perpendicular to) the scan direction.
    pub fn new(a: Point3, b: Point3, c: Point3, scan_dir: &Vec3) -> Self {
        let normal = (b - a).cross(&(c - a));
        Self {
            a,
            b,
            c,
            bounds: Aabb3::from_points([&a, &b, &c]),
            front_facing: normal.dot(scan_dir) <= 0.0,
        }
    }

    /// Barycentric weights `(u, v, w)` of `p` projected onto the triangle
    /// plane, with `p ≈ u*a + v*b + w*c`.
    ///
    /// Degenerate triangles return weight 1 on `a`.
    pub fn barycentric(&self, p: &Point3) -> (f32, f32, f32) {
        let v0 = self.b - self.a;
        let v1 = self.c - self.a;
        let v2 = p - self.a;
        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() <= f32::EPSILON * (d00 * d11).max(f32::MIN_POSITIVE) {
            return (1.0, 0.0, 0.0);
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        (1.0 - v - w, v, w)
    }

    /// Interpolate per-vertex texture coordinates at `p`.
    pub fn interpolate_uv(&self, p: &Point3, uv: [[f32; 2]; 3]) -> [f32; 2] {
        let (u, v, w) = self.barycentric(p);
        [
            uv[0][0] * u + uv[1][0] * v + uv[2][0] * w,
            uv[0][1] * u + uv[1][1] * v + uv[2][1] * w,
        ]
    }

    /// True if the triangle overlaps the box (touching counts).
    pub fn overlaps_box(&self, center: &Point3, half_extents: &Vec3) -> bool {
        triangle_box_overlap([self.a, self.b, self.c], center, half_extents)
    }
}

/// True if the triangle `tri` overlaps the axis-aligned box given by its
/// centre and half extents. Touching counts as overlap.
pub fn triangle_box_overlap(tri: [Point3; 3], center: &Point3, half_extents: &Vec3) -> bool {
    let e = half_extents;
    let v0 = tri[0] - center;
    let v1 = tri[1] - center;
    let v2 = tri[2] - center;

    let f0 = v1 - v0;
    let f1 = v2 - v1;
    let f2 = v0 - v2;

    // Edge cross products with the box axes.
    for f in [f0, f1, f2] {
        let axes = [
            (Vec3::new(0.0, -f.z, f.y), e.y * f.z.abs() + e.z * f.y.abs()),
            (Vec3::new(f.z, 0.0, -f.x), e.x * f.z.abs() + e.z * f.x.abs()),
            (Vec3::new(-f.y, f.x, 0.0), e.x * f.y.abs() + e.y * f.x.abs()),
        ];
        for (axis, r) in axes {
            let p0 = v0.dot(&axis);
            let p1 = v1.dot(&axis);
            let p2 = v2.dot(&axis);
            let min = p0.min(p1).min(p2);
            let max = p0.max(p1).max(p2);
            if min > r || max < -r {
                return false;
            }
        }
    }

    // Box face normals.
    for axis in 0..3 {
        let min = v0[axis].min(v1[axis]).min(v2[axis]);
        let max = v0[axis].max(v1[axis]).max(v2[axis]);
        if min > e[axis] || max < -e[axis] {
            return false;
        }
    }

    // Triangle plane.
    let normal = f0.cross(&f1);
    let r = e.x * normal.x.abs() + e.y * normal.y.abs() + e.z * normal.z.abs();
    let s = normal.dot(&v0);
    s.abs() <= r
}
