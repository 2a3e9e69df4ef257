use anyhow::{Context, Result};

use crate::texture_pair::{CascadeTextureDevice, TextureArrayDesc, SHADOW_TEXTURE_FORMAT};

pub struct HeadlessGpu {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

pub async fn request_headless_device() -> Result<HeadlessGpu> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("Failed to request headless adapter")?;
    let device_desc = wgpu::DeviceDescriptor {
        label: Some("Shadow Data Device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        experimental_features: wgpu::ExperimentalFeatures::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: wgpu::Trace::default(),
    };
    let (device, queue) =
        adapter.request_device(&device_desc).await.context("Failed to request headless device")?;
    Ok(HeadlessGpu { adapter, device, queue })
}

pub struct GpuTextureArray {
    texture: wgpu::Texture,
    array_view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
    desc: TextureArrayDesc,
}

impl GpuTextureArray {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn array_view(&self) -> &wgpu::TextureView {
        &self.array_view
    }

    pub fn layer_view(&self, layer: u32) -> Option<&wgpu::TextureView> {
        self.layer_views.get(layer as usize)
    }

    pub fn desc(&self) -> &TextureArrayDesc {
        &self.desc
    }
}

/// Device seam over wgpu. Clears are batched into one encoder until [`CascadeTextureDevice::flush`].
pub struct GpuCascadeDevice {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pending: Option<wgpu::CommandEncoder>,
}

impl GpuCascadeDevice {
    pub fn new(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { adapter, device, queue, pending: None }
    }

    pub fn from_headless(gpu: HeadlessGpu) -> Self {
        Self::new(gpu.adapter, gpu.device, gpu.queue)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// A 1x1 neutral array for shading when shadow data is unavailable.
    pub fn create_null_array(&mut self, layer_count: u32) -> NullShadowArray {
        let desc = TextureArrayDesc {
            label: "Shadow Null",
            format: SHADOW_TEXTURE_FORMAT,
            resolution: 1,
            layer_count: layer_count.max(1),
        };
        let array = self.create_array(&desc);
        for layer in 0..desc.layer_count {
            self.clear_layer(&array, layer);
        }
        self.flush();
        NullShadowArray { array }
    }
}

impl CascadeTextureDevice for GpuCascadeDevice {
    type Array = GpuTextureArray;

    fn supports_format(&self, format: wgpu::TextureFormat) -> bool {
        let features = self.adapter.get_texture_format_features(format);
        let required = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT;
        features.allowed_usages.contains(required)
            && features.flags.contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    }

    fn create_array(&mut self, desc: &TextureArrayDesc) -> GpuTextureArray {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: desc.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage(),
            view_formats: &[],
        });
        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Array View"),
            format: Some(desc.format),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            base_mip_level: 0,
            mip_level_count: Some(1),
            base_array_layer: 0,
            array_layer_count: Some(desc.layer_count),
            ..Default::default()
        });
        let layer_views = (0..desc.layer_count)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Cascade Layer"),
                    format: Some(desc.format),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        GpuTextureArray { texture, array_view, layer_views, desc: desc.clone() }
    }

    fn clear_layer(&mut self, array: &GpuTextureArray, layer: u32) {
        let Some(view) = array.layer_view(layer) else {
            log::warn!("[shadow] clear of missing layer {layer} in {}", array.desc.label);
            return;
        };
        let encoder = self.pending.get_or_insert_with(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Shadow Clear") })
        });
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Clear Layer"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.pending.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}

pub struct NullShadowArray {
    array: GpuTextureArray,
}

impl NullShadowArray {
    pub fn array_view(&self) -> &wgpu::TextureView {
        self.array.array_view()
    }

    pub fn layer_count(&self) -> u32 {
        self.array.desc.layer_count
    }
}
