//! Surface marking and face-parity interior fill.

use log::{debug, info};
use molar_grid::{DensityField, GridDims, GridPlacement, TexCoord, TexCoordField};
use molar_math::Vec3;
use rayon::prelude::*;

use crate::{smooth, Result, Triangle, TriangleMesh, VoxelizeError};

/// Padding, in voxels, subtracted from the requested resolution and spread
/// around the mesh bounds.
const PADDING: usize = 4;

/// Output of the voxelizer.
#[derive(Debug, Clone)]
pub struct VoxelizedMesh {
    /// Mesh-space position of voxel `(0, 0, 0)` and the voxel size.
    pub placement: GridPlacement,
    /// Signed density.
    pub density: DensityField,
    /// Texture coordinate per voxel.
    pub texcoords: TexCoordField,
}

impl VoxelizedMesh {
    /// Edge length of one voxel in mesh units.
    pub fn voxel_size(&self) -> f32 {
        self.placement.voxel_size
    }

    /// Grid dimensions.
    pub fn dims(&self) -> GridDims {
        self.density.dims()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    filled: bool,
    front: bool,
    uv: TexCoord,
}

impl Cell {
    fn is_front(&self) -> bool {
        self.filled && self.front
    }

    fn is_back(&self) -> bool {
        self.filled && !self.front
    }

    fn is_empty(&self) -> bool {
        !self.filled
    }
}

/// Column-major scratch volume: each `(x, y)` column is contiguous in z so
/// the fill pass can hand whole columns to worker threads.
struct Columns {
    dims: GridDims,
    cells: Vec<Cell>,
}

impl Columns {
    fn new(dims: GridDims) -> Self {
        Self {
            dims,
            cells: vec![Cell::default(); dims.volume()],
        }
    }

    fn cell_mut(&mut self, x: usize, y: usize, z: usize) -> &mut Cell {
        let col = x + y * self.dims.x;
        &mut self.cells[col * self.dims.z + z]
    }
}

/// Voxelize `mesh` so its longest side spans about `resolution` voxels.
///
/// Four voxels of the resolution are reserved as padding, so the mesh
/// itself covers `resolution - 4` voxels along its longest axis and the
/// grid keeps an empty border on every side.
pub fn voxelize(mesh: &TriangleMesh, resolution: usize) -> Result<VoxelizedMesh> {
    mesh.validate()?;
    if resolution <= PADDING {
        return Err(VoxelizeError::ResolutionTooSmall(resolution));
    }

    let bounds = mesh.bounds();
    let voxel_size = bounds.max_extent() / (resolution - PADDING) as f32;
    let start = bounds.min - Vec3::repeat(2.0 * voxel_size);
    let end = bounds.max + Vec3::repeat(voxel_size);
    let size = end - start;
    let axis = |extent: f32| (extent / voxel_size).ceil() as usize + PADDING;
    let dims = GridDims::new(axis(size.x), axis(size.y), axis(size.z));
    dims.validate()
        .map_err(|e| VoxelizeError::InvalidMesh(e.to_string()))?;
    let placement = GridPlacement::new(start, voxel_size, dims);

    let mut columns = Columns::new(dims);
    mark_surface(mesh, &placement, &mut columns);
    fill_interior(&mut columns);

    let (density, texcoords) = to_fields(&columns);
    let empty = dims.volume() - density.count_above(0.0);
    info!(
        "generated a {} voxel grid ({} voxels, voxel size {voxel_size})",
        dims,
        dims.volume()
    );
    debug!(
        "empty voxel count: {empty} ({:.1}% of all voxels)",
        100.0 * empty as f64 / dims.volume() as f64
    );

    Ok(VoxelizedMesh {
        placement,
        density,
        texcoords,
    })
}

/// [`voxelize`] followed by `passes` rounds of [`smooth`].
pub fn smooth_voxelize(
    mesh: &TriangleMesh,
    resolution: usize,
    passes: usize,
) -> Result<VoxelizedMesh> {
    let mut grid = voxelize(mesh, resolution)?;
    grid.density = smooth(grid.density, passes);
    Ok(grid)
}

fn mark_surface(mesh: &TriangleMesh, placement: &GridPlacement, columns: &mut Columns) {
    let dims = placement.dims;
    let vs = placement.voxel_size;
    let half = Vec3::repeat(0.5 * vs);
    let scan = Vec3::z();

    let cell_range = |lo: f32, hi: f32, n: usize| {
        let lo = ((lo / vs).floor().max(0.0) as usize).min(n - 1);
        let hi = ((hi / vs).ceil().max(0.0) as usize).min(n - 1);
        lo..=hi
    };

    for t in 0..mesh.num_triangles() {
        let [a, b, c] = mesh.triangle(t);
        let tri = Triangle::new(a, b, c, &scan);
        let uvs = mesh.triangle_uvs(t);

        let lo = tri.bounds.min - placement.origin;
        let hi = tri.bounds.max - placement.origin;
        let xs = cell_range(lo.x, hi.x, dims.x);
        let ys = cell_range(lo.y, hi.y, dims.y);
        let zs = cell_range(lo.z, hi.z, dims.z);

        for z in zs {
            for y in ys.clone() {
                for x in xs.clone() {
                    let center = placement.voxel_center(x, y, z);
                    if !tri.overlaps_box(&center, &half) {
                        continue;
                    }
                    let cell = columns.cell_mut(x, y, z);
                    // A voxel touched by both orientations counts as back.
                    cell.front = if cell.filled {
                        cell.front && tri.front_facing
                    } else {
                        tri.front_facing
                    };
                    cell.filled = true;
                    cell.uv = tri.interpolate_uv(&center, uvs);
                }
            }
        }
    }
}

fn fill_interior(columns: &mut Columns) {
    let depth = columns.dims.z;
    columns
        .cells
        .par_chunks_mut(depth)
        .for_each(fill_column);
}

/// Scan one column along +z.
///
/// A run of front-facing surface voxels opens the solid. The empty span
/// after it is filled only if the next surface voxel faces back; the whole
/// back-facing run is then part of the solid. A column whose first surface
/// voxel is already back-facing (a silhouette voxel touched by both
/// orientations) opens the solid at that run instead.
fn fill_column(column: &mut [Cell]) {
    let n = column.len();
    let mut z = 0;
    while z < n {
        if column[z].is_empty() {
            z += 1;
            continue;
        }

        let mut shell_end = z;
        let mut uv = column[z].uv;
        while shell_end < n && column[shell_end].is_front() {
            uv = column[shell_end].uv;
            shell_end += 1;
        }
        if shell_end == z {
            while shell_end < n && column[shell_end].is_back() {
                uv = column[shell_end].uv;
                shell_end += 1;
            }
        }
        if shell_end >= n {
            break;
        }

        let mut back = shell_end;
        while back < n && column[back].is_empty() {
            back += 1;
        }
        if back >= n {
            break;
        }

        if column[back].is_back() {
            for cell in &mut column[shell_end..back] {
                cell.filled = true;
                cell.uv = uv;
            }
            while back < n && column[back].is_back() {
                back += 1;
            }
        }
        z = back;
    }
}

fn to_fields(columns: &Columns) -> (DensityField, TexCoordField) {
    let dims = columns.dims;
    let cell = |x: usize, y: usize, z: usize| columns.cells[(x + y * dims.x) * dims.z + z];
    let density = DensityField::from_fn(dims, |x, y, z| {
        if cell(x, y, z).filled {
            1.0
        } else {
            -1.0
        }
    });
    let texcoords = TexCoordField::from_fn(dims, |x, y, z| cell(x, y, z).uv);
    (density, texcoords)
}
