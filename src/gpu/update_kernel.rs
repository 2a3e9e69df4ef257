use anyhow::{Context, Result};
use std::sync::Arc;

use super::GpuTextureArray;
use crate::dispatch::DispatchParameters;
use crate::texture_pair::{ArraySlot, TextureArrayPair, SHADOW_TEXTURE_FORMAT};
use crate::work_list::WorkList;

/// Dynamic-offset stride between per-cascade uniforms.
pub const UNIFORM_STRIDE: u64 = 256;
pub const WORKGROUP_SIZE: u32 = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UpdateShadowUniform {
    pub center_pos: [f32; 4],
    pub scale: [f32; 4],
    pub source_center_pos: [f32; 4],
    pub source_scale: [f32; 4],
    pub cam_pos: [f32; 4],
    pub cam_forward: [f32; 4],
    pub jitter_diameters_current_frame_weights: [f32; 4],
    pub main_camera_view_proj: [[f32; 4]; 4],
    pub sim_delta_time: f32,
    pub slice_index: u32,
    pub source_slice_index: u32,
    pub resolution: u32,
    pub frame_seed: u32,
    pub _padding: [u32; 3],
}

impl UpdateShadowUniform {
    pub fn from_params(params: &DispatchParameters, resolution: u32) -> Self {
        Self {
            center_pos: params.transform.position.extend(1.0).to_array(),
            scale: params.transform.scale.extend(1.0).to_array(),
            source_center_pos: params.source_transform.position.extend(1.0).to_array(),
            source_scale: params.source_transform.scale.extend(1.0).to_array(),
            cam_pos: params.viewpoint.position.extend(1.0).to_array(),
            cam_forward: params.viewpoint.forward.extend(0.0).to_array(),
            jitter_diameters_current_frame_weights: params.jitter_diameters_current_frame_weights.to_array(),
            main_camera_view_proj: params.view_projection.to_cols_array_2d(),
            sim_delta_time: params.delta_time,
            slice_index: params.cascade,
            source_slice_index: params.source_cascade,
            resolution,
            frame_seed: params.frame as u32,
            _padding: [0; 3],
        }
    }
}

struct KernelResources {
    pipeline: wgpu::ComputePipeline,
    cascade_bgl: Arc<wgpu::BindGroupLayout>,
    shadow_input_bgl: Arc<wgpu::BindGroupLayout>,
    sampler: wgpu::Sampler,
}

pub struct KernelExecuteParams<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub textures: &'a TextureArrayPair<GpuTextureArray>,
    /// Reallocation counter of `textures`; a change invalidates cached bind groups.
    pub generation: u64,
    pub work_list: &'a WorkList,
    /// Host-provided group 1: the light's screen-space shadow mask and its sampler.
    pub shadow_input: &'a wgpu::BindGroup,
}

/// Executes a shadow-data work-list: one compute dispatch per recorded cascade.
#[derive(Default)]
pub struct UpdateShadowKernel {
    resources: Option<KernelResources>,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_capacity: usize,
    bind_groups: [Option<wgpu::BindGroup>; 2],
    bound_generation: Option<u64>,
    staging: Vec<u8>,
}

impl UpdateShadowKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout the host must build its shadow-mask bind group against.
    pub fn shadow_input_layout(&mut self, device: &wgpu::Device) -> Result<Arc<wgpu::BindGroupLayout>> {
        self.ensure_resources(device)?;
        let resources = self.resources.as_ref().context("Update shadow resources missing")?;
        Ok(resources.shadow_input_bgl.clone())
    }

    pub fn execute(&mut self, params: KernelExecuteParams<'_>) -> Result<usize> {
        let dispatches = params.work_list.dispatches();
        if dispatches.is_empty() {
            return Ok(0);
        }
        self.ensure_resources(params.device)?;
        self.ensure_uniforms(params.device, dispatches.len());
        if self.bound_generation != Some(params.generation) {
            self.bind_groups = [None, None];
            self.bound_generation = Some(params.generation);
        }

        let resolution = params.textures.resolution();
        self.staging.clear();
        self.staging.resize(dispatches.len() * UNIFORM_STRIDE as usize, 0);
        for (index, command) in dispatches.iter().enumerate() {
            let uniform = UpdateShadowUniform::from_params(&command.params, resolution);
            let start = index * UNIFORM_STRIDE as usize;
            let bytes = bytemuck::bytes_of(&uniform);
            self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        }
        let uniform_buffer = self.uniform_buffer.as_ref().context("Update shadow uniform buffer missing")?;
        params.queue.write_buffer(uniform_buffer, 0, &self.staging);

        for command in dispatches {
            self.ensure_bind_group(params.device, params.textures, command.source)?;
        }

        let resources = self.resources.as_ref().context("Update shadow resources missing")?;
        let groups = resolution.div_ceil(WORKGROUP_SIZE);
        let mut pass = params.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Update Shadow Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&resources.pipeline);
        pass.set_bind_group(1, params.shadow_input, &[]);
        for (index, command) in dispatches.iter().enumerate() {
            let bind_group = self.bind_groups[command.source.index()]
                .as_ref()
                .context("Update shadow cascade bind group missing")?;
            let offset = (index as u64 * UNIFORM_STRIDE) as u32;
            pass.set_bind_group(0, bind_group, &[offset]);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        Ok(dispatches.len())
    }

    fn ensure_resources(&mut self, device: &wgpu::Device) -> Result<()> {
        if self.resources.is_some() {
            return Ok(());
        }
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Update Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../assets/shaders/update_shadow.wgsl").into()),
        });

        let cascade_bgl = Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Shadow Cascade BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<UpdateShadowUniform>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: SHADOW_TEXTURE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                    },
                    count: None,
                },
            ],
        }));

        let shadow_input_bgl = Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Shadow Input BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        }));

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Update Shadow Pipeline Layout"),
            bind_group_layouts: &[cascade_bgl.as_ref(), shadow_input_bgl.as_ref()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Update Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("update_shadow"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Update Shadow History Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        self.resources = Some(KernelResources { pipeline, cascade_bgl, shadow_input_bgl, sampler });
        self.bind_groups = [None, None];
        Ok(())
    }

    fn ensure_uniforms(&mut self, device: &wgpu::Device, dispatch_count: usize) {
        if self.uniform_buffer.is_some() && self.uniform_capacity >= dispatch_count {
            return;
        }
        let capacity = dispatch_count.max(1).next_power_of_two();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Update Shadow Uniform Buffer"),
            size: capacity as u64 * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.uniform_buffer = Some(buffer);
        self.uniform_capacity = capacity;
        self.bind_groups = [None, None];
    }

    fn ensure_bind_group(
        &mut self,
        device: &wgpu::Device,
        textures: &TextureArrayPair<GpuTextureArray>,
        source: ArraySlot,
    ) -> Result<()> {
        if self.bind_groups[source.index()].is_some() {
            return Ok(());
        }
        let resources = self.resources.as_ref().context("Update shadow resources missing")?;
        let buffer = self.uniform_buffer.as_ref().context("Update shadow uniform buffer missing")?;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Update Shadow Cascade BG"),
            layout: resources.cascade_bgl.as_ref(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<UpdateShadowUniform>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(textures.get(source).array_view()),
                },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&resources.sampler) },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(textures.get(source.other()).array_view()),
                },
            ],
        });
        self.bind_groups[source.index()] = Some(bind_group);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{CascadeTransform, Staleness};
    use crate::dispatch::Viewpoint;
    use glam::{Mat4, Vec3, Vec4};

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<UpdateShadowUniform>(), 208);
        assert!(std::mem::size_of::<UpdateShadowUniform>() as u64 <= UNIFORM_STRIDE);
    }

    #[test]
    fn uniform_carries_cascade_and_source_slices() {
        let params = DispatchParameters {
            cascade: 3,
            source_cascade: 4,
            transform: CascadeTransform::new(Vec3::new(8.0, 0.0, -4.0), Vec3::splat(16.0), 9),
            source_transform: CascadeTransform::new(Vec3::new(0.0, 0.0, 0.0), Vec3::splat(32.0), 8),
            source_staleness: Staleness::Stale { frames: 1 },
            viewpoint: Viewpoint::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -2.0)),
            jitter_diameters_current_frame_weights: Vec4::new(15.0, 0.6, 0.03, 0.15),
            view_projection: Mat4::IDENTITY,
            delta_time: 0.016,
            frame: 9,
        };
        let uniform = UpdateShadowUniform::from_params(&params, 256);
        assert_eq!(uniform.slice_index, 3);
        assert_eq!(uniform.source_slice_index, 4);
        assert_eq!(uniform.resolution, 256);
        assert_eq!(uniform.center_pos, [8.0, 0.0, -4.0, 1.0]);
        assert_eq!(uniform.source_scale[0], 32.0);
        assert_eq!(uniform.cam_forward, [0.0, 0.0, -1.0, 0.0]);
        assert_eq!(uniform.jitter_diameters_current_frame_weights, [15.0, 0.6, 0.03, 0.15]);
        assert_eq!(uniform.frame_seed, 9);
    }
}
