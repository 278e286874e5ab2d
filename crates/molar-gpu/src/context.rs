//! wgpu device and queue, owned by whoever creates them.

use bytemuck::Pod;
use molar_grid::GridError;
use thiserror::Error;
use wgpu::{Device, Instance, Queue};

/// Errors that can occur during GPU operations.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Buffer mapping failed.
    #[error("Buffer mapping failed")]
    BufferMapping,

    /// A buffer would exceed what the device can bind.
    #[error("{label} buffer needs {size} bytes, device limit is {limit}")]
    BufferTooLarge {
        /// Which buffer.
        label: &'static str,
        /// Requested size in bytes.
        size: u64,
        /// Device binding limit in bytes.
        limit: u64,
    },

    /// A grid does not fit the device-side buffers.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Surface extraction setup failed.
    #[error(transparent)]
    Isosurface(#[from] molar_isosurface::IsosurfaceError),

    /// Tool parameters were rejected.
    #[error(transparent)]
    Carve(#[from] molar_carve::CarveError),
}

/// A device and its queue.
///
/// One context is shared by every GPU-backed tooth through an `Arc`; it is
/// created explicitly and passed in, never looked up globally.
pub struct GpuContext {
    /// The wgpu device for creating resources and pipelines.
    pub device: Device,
    /// The command queue for submitting work.
    pub queue: Queue,
    /// Adapter the device was created on.
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Pick a high-performance adapter and open a device with its full
    /// limits, so large voxel grids can be bound.
    pub async fn new() -> Result<Self, GpuError> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY | wgpu::Backends::GL,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("molar device"),
                    required_limits: adapter.limits(),
                    ..Default::default()
                },
                None,
            )
            .await?;

        log::info!(
            "using {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );
        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Create the context synchronously (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }

    /// Fail if a storage buffer of `size` bytes cannot be bound.
    pub fn check_storage_size(&self, label: &'static str, size: u64) -> Result<(), GpuError> {
        let limits = self.device.limits();
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if size > limit {
            return Err(GpuError::BufferTooLarge { label, size, limit });
        }
        Ok(())
    }

    /// Copy `len` elements from the start of `buffer` back to the host.
    ///
    /// Blocks until the device has finished all submitted work. `buffer`
    /// needs `COPY_SRC` usage.
    pub fn read_buffer<T: Pod>(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<T>, GpuError> {
        let size = (len * std::mem::size_of::<T>()) as u64;
        if size == 0 {
            return Ok(Vec::new());
        }
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::BufferMapping)?
            .map_err(|_| GpuError::BufferMapping)?;

        let data = buffer_slice.get_mapped_range();
        let out: Vec<T> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();
        Ok(out)
    }
}
