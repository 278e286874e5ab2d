//! Device-resident copies of a tooth's grids.

use std::sync::Arc;

use molar_grid::{DensityField, GridDims, TexCoordField, ToughnessField};
use wgpu::util::DeviceExt;

use crate::context::{GpuContext, GpuError};

/// Density, toughness, texture coordinate and collision buffers for one
/// grid. The density buffer is what the carve kernels write and the
/// surface kernel reads.
pub struct GpuGrid {
    ctx: Arc<GpuContext>,
    dims: GridDims,
    pub(crate) density: wgpu::Buffer,
    pub(crate) toughness: wgpu::Buffer,
    pub(crate) texcoords: wgpu::Buffer,
    pub(crate) collision: wgpu::Buffer,
}

impl GpuGrid {
    /// Upload the grids. Without texture coordinates a zero buffer is
    /// bound in their place.
    pub fn upload(
        ctx: Arc<GpuContext>,
        density: &DensityField,
        toughness: &ToughnessField,
        texcoords: Option<&TexCoordField>,
    ) -> Result<Self, GpuError> {
        let dims = density.dims();
        density.ensure_same_dims(toughness)?;
        if let Some(t) = texcoords {
            density.ensure_same_dims(t)?;
        }
        let volume = dims.volume() as u64;
        let scalar_bytes = volume * 4;
        let uv_bytes = volume * 8;
        ctx.check_storage_size("density", scalar_bytes)?;
        ctx.check_storage_size("texcoord", uv_bytes)?;

        let density_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Density Buffer"),
                contents: bytemuck::cast_slice(density.as_slice()),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            });

        let toughness_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Toughness Buffer"),
                contents: bytemuck::cast_slice(toughness.as_slice()),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });

        let texcoord_buffer = match texcoords {
            Some(t) => ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("TexCoord Buffer"),
                    contents: bytemuck::cast_slice(t.as_slice()),
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                }),
            None => ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("TexCoord Buffer"),
                size: uv_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        };

        let collision_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Collision Buffer"),
            size: scalar_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!("uploaded {dims} grid, {} bytes per scalar field", scalar_bytes);
        Ok(Self {
            ctx,
            dims,
            density: density_buffer,
            toughness: toughness_buffer,
            texcoords: texcoord_buffer,
            collision: collision_buffer,
        })
    }

    /// Grid dimensions.
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Shared device context.
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Read the current density back. Blocks until carving has finished.
    pub fn read_density(&self) -> Result<DensityField, GpuError> {
        let data = self.ctx.read_buffer::<f32>(&self.density, self.dims.volume())?;
        Ok(DensityField::from_vec(self.dims, data)?)
    }

    /// Read the collision flags back.
    pub fn read_collision(&self) -> Result<molar_grid::CollisionBuffer, GpuError> {
        let data = self.ctx.read_buffer::<f32>(&self.collision, self.dims.volume())?;
        Ok(molar_grid::CollisionBuffer::from_vec(self.dims, data)?)
    }
}
