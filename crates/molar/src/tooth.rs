//! The carvable tooth entity.

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use molar_carve::{CollisionReport, Tool};
use molar_eval::EvaluationResult;
use molar_grid::{DensityField, GridDims, GridPlacement, GridSnapshot, TexCoordField};
use molar_isosurface::{BuildStats, Mesh};
use molar_math::Point3;
use molar_voxelize::{VoxelizeError, VoxelizedMesh};

use crate::backend::VoxelBackend;
use crate::config::SimulationConfig;
use crate::evaluation::EvaluationTask;
use crate::haptics::HapticsSink;
use crate::overlay::{overlay_meshes, EvaluationOverlays};
use crate::simulation::Simulation;
use crate::{MolarError, Result};

/// What happened during one [`Tooth::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Tools applied.
    pub tools: usize,
    /// Collision signal over all tools.
    pub collision: CollisionReport,
    /// Surface rebuild.
    pub mesh: BuildStats,
}

/// A tooth being carved.
///
/// Owns its grids through a [`VoxelBackend`]; no two teeth share grids.
/// The pristine density is kept on the host for evaluation.
pub struct Tooth {
    placement: GridPlacement,
    initial: Arc<DensityField>,
    texcoords: TexCoordField,
    backend: Box<dyn VoxelBackend>,
    config: SimulationConfig,
    evaluation: Option<EvaluationTask>,
    steps: u64,
}

impl Tooth {
    pub(crate) fn new(
        placement: GridPlacement,
        initial: DensityField,
        texcoords: TexCoordField,
        backend: Box<dyn VoxelBackend>,
        config: SimulationConfig,
    ) -> Result<Self> {
        crate::backend::check_placement(&initial, &placement)?;
        let mut tooth = Self {
            placement,
            initial: Arc::new(initial),
            texcoords,
            backend,
            config,
            evaluation: None,
            steps: 0,
        };
        let stats = tooth.rebuild_mesh()?;
        log::info!(
            "tooth ready: {} grid, voxel size {}, {} backend, {} triangles",
            tooth.dims(),
            tooth.placement.voxel_size,
            tooth.backend.name(),
            stats.triangles
        );
        Ok(tooth)
    }

    /// World placement of the grid.
    pub fn placement(&self) -> &GridPlacement {
        &self.placement
    }

    /// Grid dimensions.
    pub fn dims(&self) -> GridDims {
        self.placement.dims
    }

    /// Voxel edge length in world units.
    pub fn voxel_size(&self) -> f32 {
        self.placement.voxel_size
    }

    /// Density before any carving.
    pub fn initial_density(&self) -> &DensityField {
        &self.initial
    }

    /// Per-voxel texture coordinates.
    pub fn texcoords(&self) -> &TexCoordField {
        &self.texcoords
    }

    /// Name of the backend holding the grids.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Steps run so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run one simulation step.
    ///
    /// Every tool carves, then the collision flags of their regions are
    /// read, reported to `haptics` if any tool touched solid material,
    /// and cleared. The surface is rebuilt last, from the fully carved
    /// density.
    pub fn step(&mut self, tools: &[Tool], haptics: &mut dyn HapticsSink) -> Result<StepReport> {
        let mut regions = Vec::with_capacity(tools.len());
        for tool in tools {
            regions.push(self.backend.carve(tool, &self.placement)?);
        }

        let mut collision = CollisionReport::default();
        for region in &regions {
            collision = collision.merge(self.backend.probe_collision(&self.placement, region)?);
        }
        if collision.collided {
            haptics.on_collision(&collision);
        }
        if !regions.is_empty() {
            self.backend.clear_collision(&self.placement)?;
        }

        let mesh = self.rebuild_mesh()?;
        self.steps += 1;
        Ok(StepReport {
            tools: tools.len(),
            collision,
            mesh,
        })
    }

    /// Rebuild the surface from the current density. Mesh-space units
    /// are world units, centred on the tooth.
    pub fn rebuild_mesh(&mut self) -> Result<BuildStats> {
        self.backend
            .build_mesh(self.config.builder.isovalue, self.placement.voxel_size)
    }

    /// The surface from the last rebuild.
    pub fn mesh(&self) -> Result<Mesh> {
        self.backend.mesh()
    }

    /// A copy of the current density. Blocks on device readback.
    pub fn density(&self) -> Result<DensityField> {
        self.backend.density()
    }

    /// The current grids in the persisted layout.
    pub fn snapshot(&self) -> Result<GridSnapshot> {
        Ok(GridSnapshot::new(
            self.placement.voxel_size,
            self.density()?,
            self.texcoords.clone(),
        )?)
    }

    /// Write [`Tooth::snapshot`] to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.snapshot()?.save(path)?)
    }

    /// Start evaluating the preparation against `shape` in the background.
    ///
    /// Only the first request per tooth does anything; later calls keep
    /// the task already started.
    pub fn start_evaluation(&mut self, shape: &str) -> Result<()> {
        if self.evaluation.is_some() {
            log::debug!("evaluation already requested");
            return Ok(());
        }
        let params = self.config.evaluation.parameters(shape, self.dims())?;
        let current = Arc::new(self.density()?);
        self.evaluation = Some(EvaluationTask::spawn(
            self.initial.clone(),
            current,
            params,
            self.placement.voxel_size,
        ));
        Ok(())
    }

    /// The evaluation task, if one was requested.
    pub fn evaluation_task(&self) -> Option<&EvaluationTask> {
        self.evaluation.as_ref()
    }

    /// Cancel a requested evaluation that has not started yet.
    pub fn cancel_evaluation(&self) -> bool {
        self.evaluation.as_ref().is_some_and(|t| t.cancel())
    }

    /// The evaluation result if it is ready. Never blocks.
    pub fn evaluation(&mut self) -> Result<Option<&EvaluationResult>> {
        match self.evaluation.as_mut() {
            Some(task) => task.poll(),
            None => Ok(None),
        }
    }

    /// Block until the requested evaluation is done.
    pub fn wait_evaluation(&mut self) -> Result<Option<&EvaluationResult>> {
        match self.evaluation.as_mut() {
            Some(task) => task.wait(),
            None => Ok(None),
        }
    }

    /// Overlay meshes for a finished evaluation.
    pub fn evaluation_overlays(&mut self) -> Result<Option<EvaluationOverlays>> {
        let isovalue = self.config.builder.isovalue;
        let budget = self.config.builder.triangle_budget;
        let scale = self.placement.voxel_size;
        let Some(task) = self.evaluation.as_mut() else {
            return Ok(None);
        };
        task.poll()?;
        let Some(result) = task.result() else {
            return Ok(None);
        };
        let overlays = overlay_meshes(result, task.current_density(), isovalue, scale, budget)?;
        Ok(Some(overlays))
    }
}

/// A tooth whose mesh is being voxelized on a worker thread.
pub struct PendingTooth {
    position: Point3,
    handle: Option<JoinHandle<std::result::Result<VoxelizedMesh, VoxelizeError>>>,
}

impl PendingTooth {
    pub(crate) fn new(
        position: Point3,
        handle: JoinHandle<std::result::Result<VoxelizedMesh, VoxelizeError>>,
    ) -> Self {
        Self {
            position,
            handle: Some(handle),
        }
    }

    /// True once the worker has finished.
    pub fn is_ready(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the grid and create the tooth on the calling thread, which
    /// must be the one that owns the device context.
    pub fn wait(mut self, sim: &Simulation) -> Result<Tooth> {
        self.take(sim)
    }

    fn take(&mut self, sim: &Simulation) -> Result<Tooth> {
        let handle = self.handle.take().ok_or(MolarError::NotReady)?;
        let grid = handle
            .join()
            .map_err(|_| MolarError::WorkerPanicked("voxelizer"))??;
        let snapshot = GridSnapshot::new(grid.voxel_size(), grid.density, grid.texcoords)?;
        sim.tooth(snapshot, self.position)
    }
}

/// A tooth as the host loop sees it: still voxelizing, or ready.
pub enum ToothSlot {
    /// Voxelization in progress.
    Voxelizing(PendingTooth),
    /// Ready to carve.
    Ready(Box<Tooth>),
}

impl ToothSlot {
    /// Promote a finished voxelization to a tooth. Returns true once the
    /// tooth is ready.
    pub fn poll(&mut self, sim: &Simulation) -> Result<bool> {
        if let ToothSlot::Voxelizing(pending) = self {
            if !pending.is_ready() {
                return Ok(false);
            }
            let tooth = pending.take(sim)?;
            *self = ToothSlot::Ready(Box::new(tooth));
        }
        Ok(true)
    }

    /// The tooth, if ready.
    pub fn tooth_mut(&mut self) -> Option<&mut Tooth> {
        match self {
            ToothSlot::Ready(tooth) => Some(tooth.as_mut()),
            ToothSlot::Voxelizing(_) => None,
        }
    }

    /// Start an evaluation. Rejected while the tooth is voxelizing.
    pub fn start_evaluation(&mut self, shape: &str) -> Result<()> {
        match self {
            ToothSlot::Ready(tooth) => tooth.start_evaluation(shape),
            ToothSlot::Voxelizing(_) => Err(MolarError::NotReady),
        }
    }
}
