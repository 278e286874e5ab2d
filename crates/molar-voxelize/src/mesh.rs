//! Input triangle meshes.

use std::f32::consts::PI;

use molar_math::{Aabb3, Point3, Vec3};

use crate::{Result, VoxelizeError};

/// An indexed triangle mesh with optional per-vertex texture coordinates.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub positions: Vec<Point3>,
    /// Per-vertex texture coordinates; empty if the mesh has none.
    pub uvs: Vec<[f32; 2]>,
    /// Triangle indices, three per triangle, counter-clockwise seen from
    /// outside.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounding box of all vertices.
    pub fn bounds(&self) -> Aabb3 {
        Aabb3::from_points(&self.positions)
    }

    /// Texture coordinates of the three corners of triangle `tri`, zero if
    /// the mesh carries no UVs.
    pub fn triangle_uvs(&self, tri: usize) -> [[f32; 2]; 3] {
        if self.uvs.len() != self.positions.len() {
            return [[0.0; 2]; 3];
        }
        let i = &self.indices[tri * 3..tri * 3 + 3];
        [
            self.uvs[i[0] as usize],
            self.uvs[i[1] as usize],
            self.uvs[i[2] as usize],
        ]
    }

    /// Corner positions of triangle `tri`.
    pub fn triangle(&self, tri: usize) -> [Point3; 3] {
        let i = &self.indices[tri * 3..tri * 3 + 3];
        [
            self.positions[i[0] as usize],
            self.positions[i[1] as usize],
            self.positions[i[2] as usize],
        ]
    }

    /// Reject meshes that cannot be voxelized.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(VoxelizeError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if self.num_triangles() == 0 {
            return Err(VoxelizeError::EmptyMesh);
        }
        if !self.uvs.is_empty() && self.uvs.len() != self.positions.len() {
            return Err(VoxelizeError::InvalidMesh(format!(
                "{} uvs for {} vertices",
                self.uvs.len(),
                self.positions.len()
            )));
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(VoxelizeError::IndexOutOfRange {
                index,
                vertex_count: self.positions.len(),
            });
        }
        if self.positions.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(VoxelizeError::InvalidMesh("non-finite vertex".into()));
        }
        let size = self.bounds().size();
        if size.x.max(size.y).max(size.z) <= 0.0 {
            return Err(VoxelizeError::ZeroExtent);
        }
        Ok(())
    }

    /// Append another mesh.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let base = self.positions.len() as u32;
        let keep_uvs = self.uvs.len() == self.positions.len() && other.uvs.len() == other.positions.len();
        self.positions.extend_from_slice(&other.positions);
        if keep_uvs {
            self.uvs.extend_from_slice(&other.uvs);
        } else {
            self.uvs.clear();
        }
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Latitude/longitude sphere centred on the origin, outward winding.
    pub fn uv_sphere(radius: f32, slices: usize, stacks: usize) -> Self {
        let slices = slices.max(3);
        let stacks = stacks.max(2);
        let mut mesh = Self::new();
        for i in 0..=stacks {
            let theta = PI * i as f32 / stacks as f32;
            let (st, ct) = theta.sin_cos();
            for j in 0..=slices {
                let phi = 2.0 * PI * j as f32 / slices as f32;
                let (sp, cp) = phi.sin_cos();
                mesh.positions
                    .push(Point3::new(radius * st * cp, radius * ct, radius * st * sp));
                mesh.uvs
                    .push([j as f32 / slices as f32, i as f32 / stacks as f32]);
            }
        }
        let row = slices as u32 + 1;
        for i in 0..stacks as u32 {
            for j in 0..slices as u32 {
                let a = i * row + j;
                let b = a + row;
                let c = b + 1;
                let d = a + 1;
                // Skip the collapsed triangle at each pole.
                if i + 1 < stacks as u32 {
                    mesh.indices.extend_from_slice(&[a, c, b]);
                }
                if i > 0 {
                    mesh.indices.extend_from_slice(&[a, d, c]);
                }
            }
        }
        mesh
    }

    /// Axis-aligned box centred on the origin with the given full size.
    pub fn cuboid(size: [f32; 3]) -> Self {
        let h = Vec3::new(size[0], size[1], size[2]) * 0.5;
        // (normal, u, v) with u x v = normal.
        let faces = [
            (Vec3::x(), Vec3::y(), Vec3::z()),
            (-Vec3::x(), Vec3::z(), Vec3::y()),
            (Vec3::y(), Vec3::z(), Vec3::x()),
            (-Vec3::y(), Vec3::x(), Vec3::z()),
            (Vec3::z(), Vec3::x(), Vec3::y()),
            (-Vec3::z(), Vec3::y(), Vec3::x()),
        ];
        let mut mesh = Self::new();
        for (n, u, v) in faces {
            let base = mesh.positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = n + u * su + v * sv;
                mesh.positions.push(Point3::from(p.component_mul(&h)));
                mesh.uvs.push([(su + 1.0) * 0.5, (sv + 1.0) * 0.5]);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Enclosed volume by the divergence theorem; positive for outward
    /// winding.
    pub fn signed_volume(&self) -> f32 {
        (0..self.num_triangles())
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_volume_and_winding() {
        let mesh = TriangleMesh::cuboid([2.0, 3.0, 4.0]);
        assert_eq!(mesh.num_triangles(), 12);
        assert_relative_eq!(mesh.signed_volume(), 24.0, epsilon = 1e-4);
        let b = mesh.bounds();
        assert_relative_eq!(b.min, Point3::new(-1.0, -1.5, -2.0));
        assert_relative_eq!(b.max, Point3::new(1.0, 1.5, 2.0));
    }

    #[test]
    fn test_uv_sphere_volume_and_winding() {
        let mesh = TriangleMesh::uv_sphere(1.0, 64, 32);
        let exact = 4.0 / 3.0 * PI;
        let v = mesh.signed_volume();
        assert!(v > 0.0, "sphere must wind outward");
        assert!((v - exact).abs() / exact < 0.02, "volume {v}");
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_meshes() {
        assert!(matches!(TriangleMesh::new().validate(), Err(VoxelizeError::EmptyMesh)));

        let mut flat = TriangleMesh::new();
        flat.positions = vec![Point3::origin(); 3];
        flat.indices = vec![0, 1, 2];
        assert!(matches!(flat.validate(), Err(VoxelizeError::ZeroExtent)));

        let mut bad_index = TriangleMesh::cuboid([1.0; 3]);
        bad_index.indices.push(99);
        bad_index.indices.push(0);
        bad_index.indices.push(1);
        assert!(matches!(
            bad_index.validate(),
            Err(VoxelizeError::IndexOutOfRange { index: 99, .. })
        ));

        let mut ragged = TriangleMesh::cuboid([1.0; 3]);
        ragged.indices.pop();
        assert!(matches!(ragged.validate(), Err(VoxelizeError::InvalidMesh(_))));
    }

    #[test]
    fn test_missing_uvs_are_zero() {
        let mut mesh = TriangleMesh::cuboid([1.0; 3]);
        mesh.uvs.clear();
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.triangle_uvs(0), [[0.0; 2]; 3]);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = TriangleMesh::cuboid([1.0; 3]);
        let b = TriangleMesh::cuboid([1.0; 3]);
        a.merge(&b);
        assert_eq!(a.num_triangles(), 24);
        assert_eq!(a.indices[36], 24);
        assert_eq!(a.uvs.len(), a.positions.len());
    }
}
