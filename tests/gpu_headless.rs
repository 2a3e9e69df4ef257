use glam::{Mat4, Vec3};
use ocean_shadow::cascade::LodTransforms;
use ocean_shadow::config::{LodConfig, ShadowSimSettings};
use ocean_shadow::dispatch::{CameraMatrices, Viewpoint};
use ocean_shadow::gpu::{
    read_layer, request_headless_device, shading_view, GpuCascadeDevice, GpuTextureArray, KernelExecuteParams,
    UpdateShadowKernel,
};
use ocean_shadow::light::{LightId, SceneLight};
use ocean_shadow::manager::{FrameOutcome, ShadowData, ShadowFrame, ShadowUpdateParams};
use ocean_shadow::texture_pair::{CascadeTextureDevice, NEUTRAL_SHADOW};
use ocean_shadow::work_list::{LightHookTable, SHADOW_DATA_STAGE};

fn mask_bind_group(kernel: &mut UpdateShadowKernel, device: &GpuCascadeDevice) -> wgpu::BindGroup {
    let layout = kernel.shadow_input_layout(device.device()).expect("shadow input layout");
    let texture = device.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Mask"),
        size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.device().create_sampler(&wgpu::SamplerDescriptor::default());
    device.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Test Mask BG"),
        layout: layout.as_ref(),
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
        ],
    })
}

#[test]
fn headless_device_runs_cascade_updates() {
    let gpu = match pollster::block_on(request_headless_device()) {
        Ok(gpu) => gpu,
        Err(err) => {
            eprintln!("skipping headless shadow data test: {err:#}");
            return;
        }
    };
    let mut device = GpuCascadeDevice::from_headless(gpu);
    if !device.supports_format(wgpu::TextureFormat::Rgba16Float) {
        eprintln!("skipping headless shadow data test: shadow format unsupported");
        return;
    }
    let lod = LodConfig::new(2, 16);
    let mut kernel = UpdateShadowKernel::new();
    let shadow_input = mask_bind_group(&mut kernel, &device);
    let null = device.create_null_array(lod.cascade_count);
    assert_eq!(null.layer_count(), lod.cascade_count);
    let mut shadow_data: ShadowData<GpuTextureArray> = ShadowData::new(ShadowSimSettings::default());
    assert!(std::ptr::eq(shading_view(&shadow_data.binding(false), &null), null.array_view()));

    let mut transforms = LodTransforms::new(lod.cascade_count as usize, lod.resolution);
    let mut hooks = LightHookTable::new();
    let light = SceneLight::directional(LightId::new(1), Vec3::NEG_Y);
    let position = Vec3::new(0.0, 10.0, 0.0);
    let forward = Vec3::new(0.0, -1.0, -0.2);
    let camera = CameraMatrices::new(
        Mat4::perspective_rh(1.0, 1.0, 0.1, 500.0),
        Mat4::look_to_rh(position, forward, Vec3::Y),
    );

    for frame in 1..=3u64 {
        transforms.update(frame, position, 4.0);
        let outcome = shadow_data.update(ShadowUpdateParams {
            device: &mut device,
            pipeline: &mut hooks,
            transforms: &mut transforms,
            frame: ShadowFrame {
                frame,
                last_update_frame: frame.saturating_sub(1).max(1),
                delta_time: 1.0 / 60.0,
                process_data: true,
                light: Some(&light),
                viewpoint: Some(Viewpoint::new(position, forward)),
                camera: Some(camera),
                lod,
                scale_difference_pow2: 0,
            },
        });
        assert_eq!(outcome, FrameOutcome::Processed { dispatches: 2 });

        let textures = shadow_data.textures().expect("textures");
        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Test Frame") });
        let mut dispatched = 0;
        for work_list in hooks.work_lists(light.id, SHADOW_DATA_STAGE) {
            dispatched += kernel
                .execute(KernelExecuteParams {
                    device: device.device(),
                    queue: device.queue(),
                    encoder: &mut encoder,
                    textures,
                    generation: shadow_data.generation(),
                    work_list,
                    shadow_input: &shadow_input,
                })
                .expect("kernel execute");
        }
        device.queue().submit(std::iter::once(encoder.finish()));
        assert_eq!(dispatched, 2);
    }

    let textures = shadow_data.textures().expect("textures");
    for layer in 0..lod.cascade_count {
        let texels = read_layer(device.device(), device.queue(), textures.targets(), layer).expect("readback");
        assert_eq!(texels.len(), (lod.resolution * lod.resolution) as usize);
        assert!(texels.iter().all(|texel| texel.iter().all(|value| value.is_finite())));
        assert!(texels.iter().all(|texel| (0.0..=1.0).contains(&texel[0])));
    }

    // A new light wipes both arrays.
    let other = SceneLight::directional(LightId::new(2), Vec3::NEG_Y);
    transforms.update(4, position, 4.0);
    shadow_data.update(ShadowUpdateParams {
        device: &mut device,
        pipeline: &mut hooks,
        transforms: &mut transforms,
        frame: ShadowFrame {
            frame: 4,
            last_update_frame: 3,
            delta_time: 1.0 / 60.0,
            process_data: false,
            light: Some(&other),
            viewpoint: Some(Viewpoint::new(position, forward)),
            camera: Some(camera),
            lod,
            scale_difference_pow2: 0,
        },
    });
    let textures = shadow_data.textures().expect("textures");
    for array in [textures.sources(), textures.targets()] {
        let texels = read_layer(device.device(), device.queue(), array, 0).expect("readback");
        assert!(texels.iter().all(|texel| *texel == NEUTRAL_SHADOW));
    }
}
