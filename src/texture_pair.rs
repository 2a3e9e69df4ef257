//! Two cascade texture arrays whose source/target roles alternate every frame.

use crate::config::LodConfig;
use crate::error::ShadowDataError;

/// Two channels are used: `r` accumulates soft shadowing, `g` hard shadowing.
pub const SHADOW_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// "Fully lit, no shadow".
pub const NEUTRAL_SHADOW: [f32; 4] = [0.0; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArraySlot {
    A,
    B,
}

impl ArraySlot {
    pub fn other(self) -> Self {
        match self {
            ArraySlot::A => ArraySlot::B,
            ArraySlot::B => ArraySlot::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            ArraySlot::A => 0,
            ArraySlot::B => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureArrayDesc {
    pub label: &'static str,
    pub format: wgpu::TextureFormat,
    pub resolution: u32,
    pub layer_count: u32,
}

impl TextureArrayDesc {
    pub fn shadow(lod: LodConfig) -> Self {
        Self {
            label: "Shadow",
            format: SHADOW_TEXTURE_FORMAT,
            resolution: lod.resolution.max(1),
            layer_count: lod.cascade_count.max(1),
        }
    }

    /// Sampled as history, written as storage, cleared as a render target, read back for probes.
    pub fn usage(&self) -> wgpu::TextureUsages {
        wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.resolution,
            height: self.resolution,
            depth_or_array_layers: self.layer_count,
        }
    }
}

/// Allocation and clearing of cascade texture arrays on the host graphics device.
pub trait CascadeTextureDevice {
    type Array;

    fn supports_format(&self, format: wgpu::TextureFormat) -> bool;
    fn create_array(&mut self, desc: &TextureArrayDesc) -> Self::Array;
    /// Sets every texel of one layer to [`NEUTRAL_SHADOW`].
    fn clear_layer(&mut self, array: &Self::Array, layer: u32);
    /// Submits any clears batched since the last flush.
    fn flush(&mut self) {}
}

pub struct TextureArrayPair<A> {
    arrays: [A; 2],
    desc: TextureArrayDesc,
    source: ArraySlot,
}

impl<A> TextureArrayPair<A> {
    pub fn allocate<D>(device: &mut D, desc: TextureArrayDesc) -> Result<Self, ShadowDataError>
    where
        D: CascadeTextureDevice<Array = A> + ?Sized,
    {
        if !device.supports_format(desc.format) {
            return Err(ShadowDataError::UnsupportedFormat(desc.format));
        }
        let first = device.create_array(&desc);
        let second = device.create_array(&desc);
        let pair = Self { arrays: [first, second], desc, source: ArraySlot::A };
        pair.clear_all(device);
        Ok(pair)
    }

    /// Exchanges roles: last frame's target becomes this frame's source. No texel moves.
    pub fn swap(&mut self) {
        self.source = self.source.other();
    }

    pub fn source_slot(&self) -> ArraySlot {
        self.source
    }

    pub fn target_slot(&self) -> ArraySlot {
        self.source.other()
    }

    pub fn get(&self, slot: ArraySlot) -> &A {
        &self.arrays[slot.index()]
    }

    pub fn sources(&self) -> &A {
        self.get(self.source_slot())
    }

    pub fn targets(&self) -> &A {
        self.get(self.target_slot())
    }

    pub fn desc(&self) -> &TextureArrayDesc {
        &self.desc
    }

    pub fn layer_count(&self) -> u32 {
        self.desc.layer_count
    }

    pub fn resolution(&self) -> u32 {
        self.desc.resolution
    }

    pub fn matches(&self, lod: LodConfig) -> bool {
        self.desc.layer_count == lod.cascade_count.max(1) && self.desc.resolution == lod.resolution.max(1)
    }

    pub fn clear_target_layer<D>(&self, device: &mut D, layer: u32)
    where
        D: CascadeTextureDevice<Array = A> + ?Sized,
    {
        device.clear_layer(self.targets(), layer);
    }

    /// Clears every layer of both arrays.
    pub fn clear_all<D>(&self, device: &mut D)
    where
        D: CascadeTextureDevice<Array = A> + ?Sized,
    {
        for layer in 0..self.desc.layer_count {
            device.clear_layer(self.sources(), layer);
            device.clear_layer(self.targets(), layer);
        }
    }
}
