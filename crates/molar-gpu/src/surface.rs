//! Marching cubes on the device.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use molar_grid::GridDims;
use molar_isosurface::{tables::packed_tri_table, BuildStats, IsosurfaceError, Mesh, Vertex};
use molar_math::{Aabb3, Point3, Vec3};
use wgpu::util::DeviceExt;

use crate::context::{GpuContext, GpuError};
use crate::grid::GpuGrid;
use crate::kernel::{shader_module, storage_entry, uniform_entry, Kernel, Module};

/// Upper bound on workgroups along one dispatch axis.
const MAX_DISPATCH: u32 = 65_535;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct SurfaceParams {
    dims: [u32; 3],
    budget: u32,
    isovalue: f32,
    scale: f32,
    clear_stride: u32,
    _padding: u32,
}

/// Rebuilds a [`GpuGrid`]'s surface into device vertex and index buffers.
///
/// The buffers hold `budget` triangles and stay bound for rendering
/// between builds. Triangles are placed in the order the device emits
/// them, which varies from run to run; the set of triangles does not.
pub struct GpuMeshBuilder {
    ctx: Arc<GpuContext>,
    dims: GridDims,
    budget: u32,
    clear_groups: [u32; 2],
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    build_pipeline: wgpu::ComputePipeline,
    clear_pipeline: wgpu::ComputePipeline,
    count: u32,
    bounds: Aabb3,
}

impl GpuMeshBuilder {
    /// Allocate output buffers for `triangle_budget` triangles over `grid`.
    pub fn new(grid: &GpuGrid, triangle_budget: usize) -> Result<Self, GpuError> {
        let ctx = grid.context().clone();
        if triangle_budget == 0 {
            return Err(IsosurfaceError::ZeroBudget.into());
        }
        let slots = triangle_budget
            .checked_mul(3)
            .filter(|&n| n <= u32::MAX as usize)
            .ok_or(IsosurfaceError::BudgetTooLarge(triangle_budget))?;
        let budget = triangle_budget as u32;
        let vertex_bytes = (slots * Vertex::SIZE) as u64;
        let index_bytes = (slots * 4) as u64;
        ctx.check_storage_size("vertex", vertex_bytes)?;

        let groups = (slots as u32).div_ceil(Kernel::ClearSurfaceTail.workgroup_size()[0]);
        let groups_x = groups.min(MAX_DISPATCH);
        let clear_groups = [groups_x, groups.div_ceil(groups_x)];

        let device = &ctx.device;
        let tri_table = packed_tri_table();
        let table_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Triangle Table Buffer"),
            contents: bytemuck::cast_slice(&tri_table),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Surface Vertex Buffer"),
            size: vertex_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Surface Index Buffer"),
            size: index_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let counter_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Triangle Counter Buffer"),
            contents: bytemuck::bytes_of(&0u32),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });

        let params = SurfaceParams {
            dims: grid.dims().to_u32(),
            budget,
            isovalue: 0.0,
            scale: 1.0,
            clear_stride: clear_groups[0] * Kernel::ClearSurfaceTail.workgroup_size()[0],
            _padding: 0,
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Surface Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
                storage_entry(5, false),
                uniform_entry(6),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: grid.density.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: grid.texcoords.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: table_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: vertex_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: index_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: counter_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Surface Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = shader_module(device, Module::Surface);
        let build_pipeline = Kernel::BuildSurface.pipeline(device, &pipeline_layout, &shader);
        let clear_pipeline = Kernel::ClearSurfaceTail.pipeline(device, &pipeline_layout, &shader);

        Ok(Self {
            dims: grid.dims(),
            budget,
            clear_groups,
            vertex_buffer,
            index_buffer,
            counter_buffer,
            params_buffer,
            bind_group,
            build_pipeline,
            clear_pipeline,
            count: 0,
            bounds: Aabb3::from_center_size(Point3::origin(), Vec3::zeros()),
            ctx,
        })
    }

    /// Extract the `isovalue` surface of the grid's current density.
    ///
    /// Blocks until the triangle count has been read back.
    pub fn build(&mut self, isovalue: f32, scale: f32) -> Result<BuildStats, GpuError> {
        let params = SurfaceParams {
            dims: self.dims.to_u32(),
            budget: self.budget,
            isovalue,
            scale,
            clear_stride: self.clear_groups[0] * Kernel::ClearSurfaceTail.workgroup_size()[0],
            _padding: 0,
        };
        let queue = &self.ctx.queue;
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        queue.write_buffer(&self.counter_buffer, 0, bytemuck::bytes_of(&0u32));

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Surface Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Build Surface Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.build_pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            let [x, y, z] = Kernel::BuildSurface.workgroups(self.dims.to_u32());
            pass.dispatch_workgroups(x, y, z);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Clear Surface Tail Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.clear_pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.clear_groups[0], self.clear_groups[1], 1);
        }
        queue.submit(std::iter::once(encoder.finish()));

        let emitted = self
            .ctx
            .read_buffer::<u32>(&self.counter_buffer, 1)?
            .first()
            .copied()
            .unwrap_or(0);
        self.count = emitted.min(self.budget);
        self.bounds = Aabb3::from_center_size(Point3::origin(), self.dims.to_vec3() * scale);

        if emitted > self.budget {
            log::warn!(
                "surface needs {emitted} triangles, budget is {}; dropped {}",
                self.budget,
                emitted - self.budget
            );
        }
        Ok(BuildStats {
            triangles: self.count as usize,
            emitted: emitted as usize,
        })
    }

    /// Triangles produced by the last build.
    pub fn triangle_count(&self) -> usize {
        self.count as usize
    }

    /// Maximum number of triangles.
    pub fn budget(&self) -> usize {
        self.budget as usize
    }

    /// Bounds reported with the last build.
    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    /// Device vertex buffer, eight floats per vertex.
    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    /// Device index buffer.
    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    /// Read the live triangles back into a host mesh.
    pub fn read_mesh(&self) -> Result<Mesh, GpuError> {
        let slots = self.count as usize * 3;
        let vertices = self.ctx.read_buffer::<Vertex>(&self.vertex_buffer, slots)?;
        let indices = self.ctx.read_buffer::<u32>(&self.index_buffer, slots)?;
        Ok(Mesh {
            vertices,
            indices,
            bounds: self.bounds,
        })
    }
}
