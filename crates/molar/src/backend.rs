//! Where a tooth's grids live and how they are carved and meshed.

use molar_carve::{carve, clear_collision, read_collision, CarveGrids, CollisionReport, Tool};
use molar_grid::{
    CollisionBuffer, DensityField, GridError, GridPlacement, TexCoordField, ToughnessField,
    VoxelRegion,
};
use molar_isosurface::{BuildStats, Mesh, MeshBuilder};

use crate::Result;

/// The per-step operations of a tooth.
///
/// Calls are ordered: every `carve` of a step finishes before the
/// following `probe_collision` or `build_mesh` observes the density.
pub trait VoxelBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Apply one tool. Returns the region it may have touched.
    fn carve(&mut self, tool: &Tool, placement: &GridPlacement) -> Result<VoxelRegion>;

    /// Collision flags set in `region` since the last clear.
    fn probe_collision(
        &mut self,
        placement: &GridPlacement,
        region: &VoxelRegion,
    ) -> Result<CollisionReport>;

    /// Reset every collision flag.
    fn clear_collision(&mut self, placement: &GridPlacement) -> Result<()>;

    /// Rebuild the surface from the current density.
    fn build_mesh(&mut self, isovalue: f32, scale: f32) -> Result<BuildStats>;

    /// The surface from the last build.
    fn mesh(&self) -> Result<Mesh>;

    /// A copy of the current density.
    fn density(&self) -> Result<DensityField>;
}

/// Grids in host memory, carved and meshed with rayon.
#[derive(Debug)]
pub struct CpuBackend {
    density: DensityField,
    toughness: ToughnessField,
    texcoords: TexCoordField,
    collision: CollisionBuffer,
    builder: MeshBuilder,
}

impl CpuBackend {
    /// Take ownership of a tooth's grids.
    pub fn new(
        density: DensityField,
        toughness: ToughnessField,
        texcoords: TexCoordField,
        triangle_budget: usize,
    ) -> Result<Self> {
        density.ensure_same_dims(&toughness)?;
        density.ensure_same_dims(&texcoords)?;
        let dims = density.dims();
        let builder = MeshBuilder::new(dims, triangle_budget)?;
        log::debug!(
            "cpu backend: {dims} grid, {triangle_budget} triangle budget, {} vertex bytes",
            triangle_budget * 3 * molar_isosurface::Vertex::SIZE
        );
        Ok(Self {
            collision: CollisionBuffer::filled(dims, 0.0),
            density,
            toughness,
            texcoords,
            builder,
        })
    }
}

impl VoxelBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn carve(&mut self, tool: &Tool, placement: &GridPlacement) -> Result<VoxelRegion> {
        let stats = carve(
            tool,
            placement,
            CarveGrids {
                density: &mut self.density,
                toughness: &self.toughness,
                collision: &mut self.collision,
            },
        )?;
        Ok(stats.region)
    }

    fn probe_collision(
        &mut self,
        _placement: &GridPlacement,
        region: &VoxelRegion,
    ) -> Result<CollisionReport> {
        Ok(read_collision(&self.collision, region))
    }

    fn clear_collision(&mut self, _placement: &GridPlacement) -> Result<()> {
        clear_collision(&mut self.collision);
        Ok(())
    }

    fn build_mesh(&mut self, isovalue: f32, scale: f32) -> Result<BuildStats> {
        Ok(self
            .builder
            .build(&self.density, Some(&self.texcoords), isovalue, scale)?)
    }

    fn mesh(&self) -> Result<Mesh> {
        Ok(self.builder.to_mesh())
    }

    fn density(&self) -> Result<DensityField> {
        Ok(self.density.clone())
    }
}

/// Grids on a wgpu device.
#[cfg(feature = "gpu")]
pub struct GpuBackend {
    grid: molar_gpu::GpuGrid,
    carver: molar_gpu::GpuCarver,
    builder: molar_gpu::GpuMeshBuilder,
}

#[cfg(feature = "gpu")]
impl GpuBackend {
    /// Upload a tooth's grids to `ctx`'s device.
    pub fn new(
        ctx: std::sync::Arc<molar_gpu::GpuContext>,
        density: &DensityField,
        toughness: &ToughnessField,
        texcoords: &TexCoordField,
        triangle_budget: usize,
    ) -> Result<Self> {
        let grid = molar_gpu::GpuGrid::upload(ctx, density, toughness, Some(texcoords))?;
        let carver = molar_gpu::GpuCarver::new(&grid);
        let builder = molar_gpu::GpuMeshBuilder::new(&grid, triangle_budget)?;
        log::debug!(
            "gpu backend on {}: {} grid, {triangle_budget} triangle budget",
            grid.context().adapter_info.name,
            grid.dims()
        );
        Ok(Self {
            grid,
            carver,
            builder,
        })
    }
}

#[cfg(feature = "gpu")]
impl VoxelBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn carve(&mut self, tool: &Tool, placement: &GridPlacement) -> Result<VoxelRegion> {
        Ok(self.carver.carve(tool, placement)?)
    }

    fn probe_collision(
        &mut self,
        placement: &GridPlacement,
        region: &VoxelRegion,
    ) -> Result<CollisionReport> {
        Ok(self.carver.probe_collision(placement, region)?)
    }

    fn clear_collision(&mut self, placement: &GridPlacement) -> Result<()> {
        self.carver.clear_collisions(placement);
        Ok(())
    }

    fn build_mesh(&mut self, isovalue: f32, scale: f32) -> Result<BuildStats> {
        Ok(self.builder.build(isovalue, scale)?)
    }

    fn mesh(&self) -> Result<Mesh> {
        Ok(self.builder.read_mesh()?)
    }

    fn density(&self) -> Result<DensityField> {
        Ok(self.grid.read_density()?)
    }
}

pub(crate) fn check_placement(density: &DensityField, placement: &GridPlacement) -> Result<()> {
    if density.dims() != placement.dims {
        return Err(GridError::DimsMismatch(placement.dims, density.dims()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use molar_grid::{CubeSource, GridDims, VoxelSource};
    use molar_math::Point3;

    fn backend(n: usize) -> (CpuBackend, GridPlacement) {
        let dims = GridDims::cube(n);
        let density = CubeSource.density(dims);
        let backend = CpuBackend::new(
            density,
            ToughnessField::filled(dims, 0.0),
            TexCoordField::filled(dims, [0.0, 0.0]),
            50_000,
        )
        .unwrap();
        (backend, GridPlacement::centered(Point3::origin(), 0.05, dims))
    }

    #[test]
    fn test_cpu_carve_probe_clear() {
        let (mut backend, placement) = backend(16);
        let region = backend
            .carve(&Tool::sphere(Point3::origin(), 1.0), &placement)
            .unwrap();
        let report = backend.probe_collision(&placement, &region).unwrap();
        assert!(report.collided);
        backend.clear_collision(&placement).unwrap();
        assert!(!backend.probe_collision(&placement, &region).unwrap().collided);
        assert!(backend.density().unwrap().count_above(0.0) < CubeSource.density(placement.dims).count_above(0.0));
    }

    #[test]
    fn test_cpu_build_mesh() {
        let (mut backend, _) = backend(12);
        let stats = backend.build_mesh(0.0, 0.05).unwrap();
        assert!(stats.triangles > 0);
        assert_eq!(backend.mesh().unwrap().num_triangles(), stats.triangles);
    }

    #[test]
    fn test_cpu_rejects_mismatched_grids() {
        let result = CpuBackend::new(
            DensityField::filled(GridDims::cube(4), 1.0),
            ToughnessField::filled(GridDims::cube(5), 0.0),
            TexCoordField::filled(GridDims::cube(4), [0.0, 0.0]),
            10,
        );
        assert!(result.is_err());
    }
}
