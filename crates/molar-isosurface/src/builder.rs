//! Marching cubes over a density grid into fixed-size output buffers.

use bytemuck::Zeroable;
use molar_grid::{DensityField, GridDims, TexCoord, TexCoordField};
use molar_math::{Aabb3, Point3, Vec3};
use rayon::prelude::*;

use crate::mesh::{Mesh, Vertex};
use crate::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use crate::{IsosurfaceError, Result};

/// Outcome of one [`MeshBuilder::build`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Triangles written to the output buffers.
    pub triangles: usize,
    /// Triangles the surface needed before the budget was applied.
    pub emitted: usize,
}

impl BuildStats {
    /// True if the budget dropped triangles.
    pub fn truncated(&self) -> bool {
        self.emitted > self.triangles
    }
}

/// Rebuilds a surface mesh from a density grid.
///
/// The vertex and index buffers are allocated once for `triangle_budget`
/// triangles and reused by every build. Triangles past the budget are
/// dropped, and slots left over from a larger previous build are zeroed so
/// a renderer drawing the whole buffer sees only the current surface.
#[derive(Debug)]
pub struct MeshBuilder {
    dims: GridDims,
    budget: usize,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    count: usize,
    bounds: Aabb3,
}

impl MeshBuilder {
    /// Allocate buffers for a `dims` grid and at most `triangle_budget`
    /// triangles.
    pub fn new(dims: GridDims, triangle_budget: usize) -> Result<Self> {
        if triangle_budget == 0 {
            return Err(IsosurfaceError::ZeroBudget);
        }
        let slots = triangle_budget
            .checked_mul(3)
            .filter(|&n| n <= u32::MAX as usize)
            .ok_or(IsosurfaceError::BudgetTooLarge(triangle_budget))?;
        Ok(Self {
            dims,
            budget: triangle_budget,
            vertices: bytemuck::zeroed_vec(slots),
            indices: vec![0; slots],
            count: 0,
            bounds: Aabb3::from_center_size(Point3::origin(), Vec3::zeros()),
        })
    }

    /// Grid dimensions this builder accepts.
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Maximum number of triangles.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Triangles produced by the last build.
    pub fn triangle_count(&self) -> usize {
        self.count
    }

    /// The whole vertex buffer, including zeroed slots past the last build.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// The whole index buffer.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Bounds reported with the last build.
    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    /// Extract the `isovalue` surface of `density`.
    ///
    /// Mesh-space positions are `(grid coordinate - dims / 2) * scale`.
    /// Normals follow the negated density gradient and texture coordinates
    /// are blended from the cut edge's corners, zero without `texcoords`.
    pub fn build(
        &mut self,
        density: &DensityField,
        texcoords: Option<&TexCoordField>,
        isovalue: f32,
        scale: f32,
    ) -> Result<BuildStats> {
        if density.dims() != self.dims {
            return Err(IsosurfaceError::DimsMismatch(self.dims, density.dims()));
        }
        if let Some(t) = texcoords {
            if t.dims() != self.dims {
                return Err(IsosurfaceError::DimsMismatch(self.dims, t.dims()));
            }
        }
        let dims = self.dims;
        let sampler = Sampler {
            dims,
            density: density.as_slice(),
            texcoords: texcoords.map(|t| t.as_slice()),
            isovalue,
            scale,
            half: dims.to_vec3() * 0.5,
        };

        let slices: Vec<Vec<[Vertex; 3]>> = (0..dims.z.saturating_sub(1))
            .into_par_iter()
            .map(|z| {
                let mut out = Vec::new();
                for y in 0..dims.y.saturating_sub(1) {
                    for x in 0..dims.x.saturating_sub(1) {
                        sampler.polygonise(x, y, z, &mut out);
                    }
                }
                out
            })
            .collect();

        let emitted: usize = slices.iter().map(Vec::len).sum();
        let kept = emitted.min(self.budget);
        for (t, tri) in slices.iter().flatten().take(kept).enumerate() {
            let base = t * 3;
            self.vertices[base..base + 3].copy_from_slice(tri);
            for k in 0..3 {
                self.indices[base + k] = (base + k) as u32;
            }
        }
        if self.count > kept {
            self.vertices[kept * 3..self.count * 3].fill(Vertex::zeroed());
            self.indices[kept * 3..self.count * 3].fill(0);
        }
        self.count = kept;
        self.bounds = Aabb3::from_center_size(Point3::origin(), dims.to_vec3() * scale);

        if kept < emitted {
            log::warn!(
                "surface needs {emitted} triangles, budget is {}; dropped {}",
                self.budget,
                emitted - kept
            );
        } else {
            log::debug!("extracted {kept} triangles from {dims} grid");
        }
        Ok(BuildStats {
            triangles: kept,
            emitted,
        })
    }

    /// Copy the live part of the buffers into a compact mesh.
    pub fn to_mesh(&self) -> Mesh {
        Mesh {
            vertices: self.vertices[..self.count * 3].to_vec(),
            indices: self.indices[..self.count * 3].to_vec(),
            bounds: self.bounds,
        }
    }
}

/// One-shot extraction with a private builder.
pub fn extract_mesh(
    density: &DensityField,
    texcoords: Option<&TexCoordField>,
    isovalue: f32,
    scale: f32,
    triangle_budget: usize,
) -> Result<Mesh> {
    let mut builder = MeshBuilder::new(density.dims(), triangle_budget)?;
    builder.build(density, texcoords, isovalue, scale)?;
    Ok(builder.to_mesh())
}

struct Sampler<'a> {
    dims: GridDims,
    density: &'a [f32],
    texcoords: Option<&'a [TexCoord]>,
    isovalue: f32,
    scale: f32,
    half: Vec3,
}

impl Sampler<'_> {
    fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.density[self.dims.index(x, y, z)]
    }

    fn texcoord(&self, x: usize, y: usize, z: usize) -> TexCoord {
        match self.texcoords {
            Some(t) => t[self.dims.index(x, y, z)],
            None => [0.0; 2],
        }
    }

    /// Central difference with neighbours clamped to the grid.
    fn gradient(&self, x: usize, y: usize, z: usize) -> Vec3 {
        let d = self.dims;
        let dx = self.value((x + 1).min(d.x - 1), y, z) - self.value(x.saturating_sub(1), y, z);
        let dy = self.value(x, (y + 1).min(d.y - 1), z) - self.value(x, y.saturating_sub(1), z);
        let dz = self.value(x, y, (z + 1).min(d.z - 1)) - self.value(x, y, z.saturating_sub(1));
        Vec3::new(dx, dy, dz)
    }

    fn polygonise(&self, x: usize, y: usize, z: usize, out: &mut Vec<[Vertex; 3]>) {
        let mut case = 0usize;
        for (i, o) in CORNER_OFFSETS.iter().enumerate() {
            if self.value(x + o[0], y + o[1], z + o[2]) < self.isovalue {
                case |= 1 << i;
            }
        }
        let cut = EDGE_TABLE[case];
        if cut == 0 {
            return;
        }
        let mut verts = [Vertex::zeroed(); 12];
        for (e, v) in verts.iter_mut().enumerate() {
            if cut & (1 << e) != 0 {
                *v = self.edge_vertex(x, y, z, e);
            }
        }
        for tri in TRI_TABLE[case].chunks_exact(3) {
            if tri[0] < 0 {
                break;
            }
            out.push([
                verts[tri[0] as usize],
                verts[tri[1] as usize],
                verts[tri[2] as usize],
            ]);
        }
    }

    fn edge_vertex(&self, x: usize, y: usize, z: usize, edge: usize) -> Vertex {
        let [c0, c1] = EDGE_CORNERS[edge];
        let o0 = CORNER_OFFSETS[c0];
        let o1 = CORNER_OFFSETS[c1];
        let (x0, y0, z0) = (x + o0[0], y + o0[1], z + o0[2]);
        let (x1, y1, z1) = (x + o1[0], y + o1[1], z + o1[2]);
        let v0 = self.value(x0, y0, z0);
        let v1 = self.value(x1, y1, z1);
        let t = (self.isovalue - v0) / (v1 - v0);

        let p0 = Vec3::new(x0 as f32, y0 as f32, z0 as f32);
        let p1 = Vec3::new(x1 as f32, y1 as f32, z1 as f32);
        let p = (p0 + (p1 - p0) * t - self.half) * self.scale;

        let g0 = self.gradient(x0, y0, z0);
        let g1 = self.gradient(x1, y1, z1);
        let n = -(g0 + (g1 - g0) * t);
        let n = n.try_normalize(1e-12).unwrap_or_else(Vec3::y);

        let uv0 = self.texcoord(x0, y0, z0);
        let uv1 = self.texcoord(x1, y1, z1);
        Vertex {
            position: [p.x, p.y, p.z],
            normal: [n.x, n.y, n.z],
            uv: [
                uv0[0] + (uv1[0] - uv0[0]) * t,
                uv0[1] + (uv1[1] - uv0[1]) * t,
            ],
        }
    }
}
