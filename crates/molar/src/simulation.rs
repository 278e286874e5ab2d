//! The context object teeth are created from.

use molar_grid::{GridPlacement, GridSnapshot};
use molar_math::Point3;
use molar_voxelize::{smooth_voxelize, TriangleMesh};

use crate::backend::{CpuBackend, VoxelBackend};
use crate::config::{BackendKind, SimulationConfig};
use crate::tooth::{PendingTooth, Tooth};
use crate::{MolarError, Result};

/// Validated settings plus the device context, if any.
///
/// Everything a tooth needs from its surroundings comes from here; there
/// is no process-wide state.
pub struct Simulation {
    config: SimulationConfig,
    #[cfg(feature = "gpu")]
    gpu: Option<std::sync::Arc<molar_gpu::GpuContext>>,
}

impl Simulation {
    /// A simulation running on the host.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            #[cfg(feature = "gpu")]
            gpu: None,
        })
    }

    /// A simulation that can place teeth on `ctx`'s device.
    #[cfg(feature = "gpu")]
    pub fn with_gpu(
        config: SimulationConfig,
        ctx: std::sync::Arc<molar_gpu::GpuContext>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            gpu: Some(ctx),
        })
    }

    /// The settings in use.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Create a tooth centred at `position` from a pre-built grid.
    pub fn tooth(&self, snapshot: GridSnapshot, position: Point3) -> Result<Tooth> {
        let dims = snapshot.dims();
        dims.validate()?;
        let placement = GridPlacement::centered(position, snapshot.voxel_size, dims);
        let toughness = self.config.toughness.build(&snapshot.density);
        let backend = self.backend(&snapshot, toughness)?;
        Tooth::new(
            placement,
            snapshot.density,
            snapshot.texcoords,
            backend,
            self.config.clone(),
        )
    }

    /// Load a persisted grid and create a tooth from it.
    pub fn load_tooth(&self, path: impl AsRef<std::path::Path>, position: Point3) -> Result<Tooth> {
        let snapshot = GridSnapshot::load(path)?;
        self.tooth(snapshot, position)
    }

    /// Voxelize `mesh` on a worker thread. The tooth is created when the
    /// returned handle is waited on.
    pub fn voxelize(&self, mesh: TriangleMesh, position: Point3) -> PendingTooth {
        let resolution = self.config.voxelizer.resolution;
        let passes = self.config.voxelizer.smoothing_passes;
        log::debug!(
            "voxelizing {} triangles at resolution {resolution}",
            mesh.num_triangles()
        );
        let handle = std::thread::spawn(move || smooth_voxelize(&mesh, resolution, passes));
        PendingTooth::new(position, handle)
    }

    fn backend(
        &self,
        snapshot: &GridSnapshot,
        toughness: molar_grid::ToughnessField,
    ) -> Result<Box<dyn VoxelBackend>> {
        let budget = self.config.builder.triangle_budget;
        match self.config.backend {
            BackendKind::Cpu => Ok(Box::new(CpuBackend::new(
                snapshot.density.clone(),
                toughness,
                snapshot.texcoords.clone(),
                budget,
            )?)),
            BackendKind::Gpu => self.gpu_backend(snapshot, toughness, budget),
        }
    }

    #[cfg(feature = "gpu")]
    fn gpu_backend(
        &self,
        snapshot: &GridSnapshot,
        toughness: molar_grid::ToughnessField,
        budget: usize,
    ) -> Result<Box<dyn VoxelBackend>> {
        let ctx = self.gpu.clone().ok_or(MolarError::GpuUnavailable)?;
        Ok(Box::new(crate::backend::GpuBackend::new(
            ctx,
            &snapshot.density,
            &toughness,
            &snapshot.texcoords,
            budget,
        )?))
    }

    #[cfg(not(feature = "gpu"))]
    fn gpu_backend(
        &self,
        _snapshot: &GridSnapshot,
        _toughness: molar_grid::ToughnessField,
        _budget: usize,
    ) -> Result<Box<dyn VoxelBackend>> {
        Err(MolarError::GpuUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molar_grid::{GridDims, SphereSource, TexCoordField, VoxelSource};

    fn snapshot(n: usize) -> GridSnapshot {
        let dims = GridDims::cube(n);
        GridSnapshot::new(
            0.1,
            SphereSource.density(dims),
            TexCoordField::filled(dims, [0.25, 0.75]),
        )
        .unwrap()
    }

    #[test]
    fn test_tooth_is_centred_on_position() {
        let sim = Simulation::new(SimulationConfig::default()).unwrap();
        let tooth = sim.tooth(snapshot(10), Point3::new(1.0, 0.0, 0.0)).unwrap();
        let p = tooth.placement();
        assert_eq!(p.origin, Point3::new(0.5, -0.5, -0.5));
        assert_eq!(tooth.backend_name(), "cpu");
        assert!(tooth.mesh().unwrap().num_triangles() > 0);
    }

    #[test]
    fn test_gpu_backend_needs_context() {
        let config = SimulationConfig {
            backend: BackendKind::Gpu,
            ..Default::default()
        };
        let sim = Simulation::new(config).unwrap();
        assert!(matches!(
            sim.tooth(snapshot(6), Point3::origin()),
            Err(MolarError::GpuUnavailable)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SimulationConfig::default();
        config.voxelizer.resolution = 2;
        assert!(Simulation::new(config).is_err());
    }
}
