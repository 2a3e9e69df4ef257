use anyhow::{anyhow, Context, Result};
use std::sync::mpsc;

use super::GpuTextureArray;

const TEXEL_BYTES: u32 = 8;

/// Copies one layer back to the CPU and decodes its half-float texels.
pub fn read_layer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    array: &GpuTextureArray,
    layer: u32,
) -> Result<Vec<[f32; 4]>> {
    let desc = array.desc();
    if layer >= desc.layer_count {
        return Err(anyhow!("layer {layer} out of range for {} layers", desc.layer_count));
    }
    let resolution = desc.resolution;
    let unpadded_row = resolution * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = unpadded_row.div_ceil(align) * align;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Shadow Readback Buffer"),
        size: (padded_row * resolution) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Shadow Readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: array.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(resolution),
            },
        },
        wgpu::Extent3d { width: resolution, height: resolution, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("Failed to wait for shadow readback")?;
    let mapped = rx.recv().context("readback callback dropped")?;
    mapped.context("Failed to map shadow readback buffer")?;

    let texels = {
        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity((resolution * resolution) as usize);
        for row in data.chunks(padded_row as usize).take(resolution as usize) {
            for texel in row[..unpadded_row as usize].chunks_exact(TEXEL_BYTES as usize) {
                let mut value = [0.0f32; 4];
                for (channel, bytes) in value.iter_mut().zip(texel.chunks_exact(2)) {
                    *channel = half::f16::from_bits(u16::from_le_bytes([bytes[0], bytes[1]])).to_f32();
                }
                texels.push(value);
            }
        }
        texels
    };
    buffer.unmap();
    Ok(texels)
}
