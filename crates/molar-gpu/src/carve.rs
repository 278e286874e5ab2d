//! Tool carving and collision probing on the device.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use molar_carve::{CollisionReport, Tool, ToolKind};
use molar_grid::{GridDims, GridPlacement, VoxelRegion};
use wgpu::util::DeviceExt;

use crate::context::{GpuContext, GpuError};
use crate::grid::GpuGrid;
use crate::kernel::{shader_module, storage_entry, uniform_entry, Kernel, Module};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CarveParams {
    origin: [f32; 3],
    voxel_size: f32,
    tip_a: [f32; 3],
    range: f32,
    tip_b: [f32; 3],
    power: f32,
    dims: [u32; 3],
    _padding0: u32,
    region_min: [u32; 3],
    _padding1: u32,
    region_max: [u32; 3],
    _padding2: u32,
}

impl CarveParams {
    fn new(placement: &GridPlacement, region: &VoxelRegion) -> Self {
        Self {
            origin: placement.origin.coords.into(),
            voxel_size: placement.voxel_size,
            tip_a: [0.0; 3],
            range: 0.0,
            tip_b: [0.0; 3],
            power: 0.0,
            dims: placement.dims.to_u32(),
            _padding0: 0,
            region_min: region.min.map(|v| v as u32),
            _padding1: 0,
            region_max: region.max.map(|v| v as u32),
            _padding2: 0,
        }
    }
}

fn region_extent(region: &VoxelRegion) -> [u32; 3] {
    [0, 1, 2].map(|a| (region.max[a] + 1 - region.min[a]) as u32)
}

/// Carves a [`GpuGrid`] in place.
///
/// Each call submits its own work, so tools applied in sequence see each
/// other's removal exactly as on the host.
pub struct GpuCarver {
    ctx: Arc<GpuContext>,
    dims: GridDims,
    hits_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    sphere_pipeline: wgpu::ComputePipeline,
    capsule_pipeline: wgpu::ComputePipeline,
    count_pipeline: wgpu::ComputePipeline,
    clear_pipeline: wgpu::ComputePipeline,
}

impl GpuCarver {
    /// Bind the carve kernels to `grid`.
    pub fn new(grid: &GpuGrid) -> Self {
        let ctx = grid.context().clone();
        let device = &ctx.device;

        let hits_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Collision Hits Buffer"),
            contents: bytemuck::bytes_of(&0u32),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Carve Params Buffer"),
            size: std::mem::size_of::<CarveParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Carve Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, false),
                uniform_entry(4),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Carve Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: grid.density.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: grid.toughness.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: grid.collision.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: hits_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Carve Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = shader_module(device, Module::Carve);

        Self {
            dims: grid.dims(),
            hits_buffer,
            params_buffer,
            sphere_pipeline: Kernel::CarveSphere.pipeline(device, &pipeline_layout, &shader),
            capsule_pipeline: Kernel::CarveCapsule.pipeline(device, &pipeline_layout, &shader),
            count_pipeline: Kernel::CountCollisions.pipeline(device, &pipeline_layout, &shader),
            clear_pipeline: Kernel::ClearCollisions.pipeline(device, &pipeline_layout, &shader),
            bind_group,
            ctx,
        }
    }

    /// Apply `tool` to the grid. Returns the region the dispatch covered.
    pub fn carve(&self, tool: &Tool, placement: &GridPlacement) -> Result<VoxelRegion, GpuError> {
        tool.validate()?;
        if placement.dims != self.dims {
            return Err(molar_grid::GridError::DimsMismatch(self.dims, placement.dims).into());
        }
        let region = tool.region(placement);
        let (a, b) = tool.tips();
        let params = CarveParams {
            tip_a: a.coords.into(),
            tip_b: b.coords.into(),
            range: tool.range,
            power: tool.power,
            ..CarveParams::new(placement, &region)
        };
        let (kernel, pipeline) = match tool.kind {
            ToolKind::Sphere => (Kernel::CarveSphere, &self.sphere_pipeline),
            ToolKind::Capsule { .. } => (Kernel::CarveCapsule, &self.capsule_pipeline),
        };
        self.dispatch(kernel, pipeline, &params, &region);
        Ok(region)
    }

    /// Count flagged voxels in `region`. Blocks on the readback.
    pub fn probe_collision(
        &self,
        placement: &GridPlacement,
        region: &VoxelRegion,
    ) -> Result<CollisionReport, GpuError> {
        self.ctx
            .queue
            .write_buffer(&self.hits_buffer, 0, bytemuck::bytes_of(&0u32));
        let params = CarveParams::new(placement, region);
        self.dispatch(Kernel::CountCollisions, &self.count_pipeline, &params, region);
        let flagged = self
            .ctx
            .read_buffer::<u32>(&self.hits_buffer, 1)?
            .first()
            .copied()
            .unwrap_or(0);
        Ok(CollisionReport::from_counts(
            flagged as usize,
            region.voxel_count(),
        ))
    }

    /// Reset every collision flag.
    pub fn clear_collisions(&self, placement: &GridPlacement) {
        let region = VoxelRegion::full(self.dims);
        let params = CarveParams::new(placement, &region);
        self.dispatch(Kernel::ClearCollisions, &self.clear_pipeline, &params, &region);
    }

    fn dispatch(
        &self,
        kernel: Kernel,
        pipeline: &wgpu::ComputePipeline,
        params: &CarveParams,
        region: &VoxelRegion,
    ) {
        self.ctx
            .queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Carve Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            let [x, y, z] = kernel.workgroups(region_extent(region));
            pass.dispatch_workgroups(x, y, z);
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molar_carve::{carve, read_collision, CarveGrids};
    use molar_grid::{CollisionBuffer, CubeSource, ToughnessField, VoxelSource};
    use molar_math::{Point3, Transform};

    #[test]
    fn test_params_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<CarveParams>(), 96);
    }

    #[test]
    fn test_region_extent() {
        let region = VoxelRegion {
            min: [2, 0, 5],
            max: [4, 0, 9],
        };
        assert_eq!(region_extent(&region), [3, 1, 5]);
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_matches_cpu_carve() {
        let dims = GridDims::cube(20);
        let placement = GridPlacement::centered(Point3::origin(), 0.05, dims);
        let mut density = CubeSource.density(dims);
        let toughness = ToughnessField::from_fn(dims, |x, _, _| if x < 10 { 0.0 } else { 2.0 });
        let mut collision = CollisionBuffer::filled(dims, 0.0);

        let ctx = Arc::new(GpuContext::new_blocking().unwrap());
        let grid = GpuGrid::upload(ctx, &density, &toughness, None).unwrap();
        let carver = GpuCarver::new(&grid);

        let tools = [
            Tool::sphere(Point3::new(0.1, 0.0, 0.0), 1.0),
            Tool::capsule(Transform::translation(-0.1, 0.1, 0.0), 0.5),
        ];
        let mut cpu_report = CollisionReport::default();
        let mut gpu_report = CollisionReport::default();
        for tool in &tools {
            let stats = carve(
                tool,
                &placement,
                CarveGrids {
                    density: &mut density,
                    toughness: &toughness,
                    collision: &mut collision,
                },
            )
            .unwrap();
            cpu_report = cpu_report.merge(read_collision(&collision, &stats.region));
            let region = carver.carve(tool, &placement).unwrap();
            assert_eq!(region, stats.region);
            gpu_report = gpu_report.merge(carver.probe_collision(&placement, &region).unwrap());
        }
        assert_eq!(gpu_report.flagged, cpu_report.flagged);

        let gpu_density = grid.read_density().unwrap();
        for (g, c) in gpu_density.as_slice().iter().zip(density.as_slice()) {
            approx::assert_abs_diff_eq!(g, c, epsilon = 1e-5);
        }

        carver.clear_collisions(&placement);
        assert_eq!(grid.read_collision().unwrap().count_above(0.0), 0);
    }
}
