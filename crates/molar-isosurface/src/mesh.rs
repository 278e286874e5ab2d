//! Renderable surface meshes.

use bytemuck::{Pod, Zeroable};
use molar_math::{Aabb3, Point3};

/// One surface vertex as laid out in the vertex buffer: position, normal
/// and texture coordinate, eight `f32` in total.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in mesh space.
    pub position: [f32; 3],
    /// Unit surface normal pointing out of the solid.
    pub normal: [f32; 3],
    /// Texture coordinate.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Size of one vertex in bytes.
    pub const SIZE: usize = std::mem::size_of::<Vertex>();

    /// Position as a point.
    pub fn point(&self) -> Point3 {
        Point3::from(self.position)
    }
}

/// A compact triangle mesh extracted from a grid.
///
/// Vertices are not shared: triangle `t` uses vertices `3t..3t+3` and the
/// index buffer is the identity.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle indices.
    pub indices: Vec<u32>,
    /// Mesh-space bounding box reported to the renderer.
    pub bounds: Aabb3,
}

impl Mesh {
    /// A mesh with no triangles.
    pub fn empty(bounds: Aabb3) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            bounds,
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// True if there are no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Corner positions of triangle `tri`.
    pub fn triangle(&self, tri: usize) -> [Point3; 3] {
        let i = &self.indices[tri * 3..tri * 3 + 3];
        [
            self.vertices[i[0] as usize].point(),
            self.vertices[i[1] as usize].point(),
            self.vertices[i[2] as usize].point(),
        ]
    }

    /// Bounding box of the actual vertex positions.
    pub fn vertex_bounds(&self) -> Aabb3 {
        let mut b = Aabb3::empty();
        for v in &self.vertices {
            b.include_point(&v.point());
        }
        b
    }

    /// Sum of triangle areas.
    pub fn surface_area(&self) -> f32 {
        (0..self.num_triangles())
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    /// Enclosed volume by the divergence theorem; positive when the
    /// triangles wind outward.
    pub fn signed_volume(&self) -> f32 {
        (0..self.num_triangles())
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }
}
