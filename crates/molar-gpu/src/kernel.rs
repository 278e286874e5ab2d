//! Named compute operations.

/// Shader module a kernel lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    /// `marching_cubes.wgsl`.
    Surface,
    /// `carve.wgsl`.
    Carve,
}

impl Module {
    /// WGSL source.
    pub fn source(self) -> &'static str {
        match self {
            Module::Surface => include_str!("shaders/marching_cubes.wgsl"),
            Module::Carve => include_str!("shaders/carve.wgsl"),
        }
    }

    /// Debug label.
    pub fn label(self) -> &'static str {
        match self {
            Module::Surface => "Surface Shader",
            Module::Carve => "Carve Shader",
        }
    }
}

/// Every compute entry point the engine dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Marching cubes over all cells.
    BuildSurface,
    /// Zero vertex and index slots past the final triangle count.
    ClearSurfaceTail,
    /// Spherical removal.
    CarveSphere,
    /// Capsule removal.
    CarveCapsule,
    /// Count collision flags in a region.
    CountCollisions,
    /// Reset collision flags in a region.
    ClearCollisions,
}

impl Kernel {
    /// Entry point name in the WGSL source.
    pub fn entry_point(self) -> &'static str {
        match self {
            Kernel::BuildSurface => "build_surface",
            Kernel::ClearSurfaceTail => "clear_tail",
            Kernel::CarveSphere => "carve_sphere",
            Kernel::CarveCapsule => "carve_capsule",
            Kernel::CountCollisions => "count_collisions",
            Kernel::ClearCollisions => "clear_collisions",
        }
    }

    /// Module holding the entry point.
    pub fn module(self) -> Module {
        match self {
            Kernel::BuildSurface | Kernel::ClearSurfaceTail => Module::Surface,
            Kernel::CarveSphere
            | Kernel::CarveCapsule
            | Kernel::CountCollisions
            | Kernel::ClearCollisions => Module::Carve,
        }
    }

    /// Workgroup size declared in the shader.
    pub fn workgroup_size(self) -> [u32; 3] {
        match self {
            Kernel::ClearSurfaceTail => [256, 1, 1],
            _ => [4, 4, 4],
        }
    }

    /// Workgroup counts covering `extent` invocations per axis.
    pub fn workgroups(self, extent: [u32; 3]) -> [u32; 3] {
        let size = self.workgroup_size();
        [
            extent[0].div_ceil(size[0]),
            extent[1].div_ceil(size[1]),
            extent[2].div_ceil(size[2]),
        ]
    }

    /// Build the compute pipeline for this kernel.
    pub fn pipeline(
        self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        module: &wgpu::ShaderModule,
    ) -> wgpu::ComputePipeline {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(self.entry_point()),
            layout: Some(layout),
            module,
            entry_point: Some(self.entry_point()),
            compilation_options: Default::default(),
            cache: None,
        })
    }
}

pub(crate) fn shader_module(device: &wgpu::Device, module: Module) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(module.label()),
        source: wgpu::ShaderSource::Wgsl(module.source().into()),
    })
}

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
