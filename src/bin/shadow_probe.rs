use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use ocean_shadow::cascade::LodTransforms;
use ocean_shadow::config::{ShadowDataConfig, ShadowDataConfigOverrides};
use ocean_shadow::dispatch::{CameraMatrices, Viewpoint};
use ocean_shadow::gpu::{
    read_layer, request_headless_device, GpuCascadeDevice, GpuTextureArray, KernelExecuteParams,
    UpdateShadowKernel,
};
use ocean_shadow::light::{LightId, SceneLight, ShadowCastingLight};
use ocean_shadow::manager::{ShadowBinding, ShadowData, ShadowFrame, ShadowUpdateParams};
use ocean_shadow::probe::{CascadeSample, ShadowFrameStats};
use ocean_shadow::rebase::ScaleTracker;
use ocean_shadow::time::FrameClock;
use ocean_shadow::work_list::{LightHookTable, SHADOW_DATA_STAGE};
use std::env;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MASK_SIZE: u32 = 4;
const BASE_CASCADE_SCALE: f32 = 8.0;

fn main() -> Result<()> {
    env_logger::init();
    let args = ProbeArgs::parse(env::args().skip(1))?;
    pollster::block_on(run_probe(args))
}

#[derive(Debug)]
struct ProbeArgs {
    frames: usize,
    config: Option<PathBuf>,
    output: PathBuf,
    swap_light_at: Option<usize>,
    zoom_every: Option<usize>,
    realtime: bool,
    overrides: ShadowDataConfigOverrides,
}

impl ProbeArgs {
    fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frames = 120usize;
        let mut config = None;
        let mut output = PathBuf::from("perf/shadow_probe.json");
        let mut swap_light_at = None;
        let mut zoom_every = None;
        let mut realtime = false;
        let mut overrides = ShadowDataConfigOverrides::default();
        let mut iter = args.into_iter();
        while let Some(raw) = iter.next() {
            let arg = raw.into();
            match arg.as_str() {
                "--frames" => {
                    let value: String = iter.next().ok_or_else(|| anyhow!("--frames requires a value"))?.into();
                    frames = value.parse().context("invalid --frames value")?;
                }
                "--config" => {
                    let value: String = iter.next().ok_or_else(|| anyhow!("--config requires a value"))?.into();
                    config = Some(PathBuf::from(value));
                }
                "--output" => {
                    let value: String = iter.next().ok_or_else(|| anyhow!("--output requires a value"))?.into();
                    output = PathBuf::from(value);
                }
                "--swap-light-at" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--swap-light-at requires a value"))?.into();
                    swap_light_at = Some(value.parse().context("invalid --swap-light-at value")?);
                }
                "--zoom-every" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--zoom-every requires a value"))?.into();
                    let every: usize = value.parse().context("invalid --zoom-every value")?;
                    zoom_every = (every > 0).then_some(every);
                }
                "--cascades" => {
                    let value: String = iter.next().ok_or_else(|| anyhow!("--cascades requires a value"))?.into();
                    overrides.cascade_count = Some(value.parse().context("invalid --cascades value")?);
                }
                "--resolution" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--resolution requires a value"))?.into();
                    overrides.resolution = Some(value.parse().context("invalid --resolution value")?);
                }
                "--realtime" => realtime = true,
                "--allow-null-light" => overrides.allow_null_light = Some(true),
                "--disabled" => overrides.enabled = Some(false),
                other => return Err(anyhow!("Unknown argument '{other}'")),
            }
        }
        Ok(Self { frames, config, output, swap_light_at, zoom_every, realtime, overrides })
    }
}

async fn run_probe(args: ProbeArgs) -> Result<()> {
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let mut config = match args.config.as_ref() {
        Some(path) => ShadowDataConfig::load_or_default(path),
        None => ShadowDataConfig::default(),
    };
    if !args.overrides.is_empty() {
        log::info!("[shadow] CLI overrides: {}", args.overrides.applied_fields().join(", "));
        config.apply_overrides(&args.overrides);
    }
    let lod = config.lod;

    let gpu = request_headless_device().await?;
    let mut device = GpuCascadeDevice::from_headless(gpu);
    let mut kernel = UpdateShadowKernel::new();
    let shadow_input = create_shadow_input(&mut kernel, &device)?;

    let mut shadow_data: ShadowData<GpuTextureArray> = ShadowData::new(config.settings);
    shadow_data.init(&mut device, lod).context("Failed to allocate shadow data textures")?;

    let mut transforms = LodTransforms::new(lod.cascade_count as usize, lod.resolution);
    let mut scale_tracker = ScaleTracker::new();
    let mut hooks = LightHookTable::new();
    let lights = [
        SceneLight::directional(LightId::new(1), Vec3::new(-0.3, -1.0, -0.2)),
        SceneLight::directional(LightId::new(2), Vec3::new(0.4, -0.8, 0.1)),
    ];
    let mut clock = FrameClock::new();
    let mut stats = ShadowFrameStats::default();
    let mut last_update_frame = 0u64;
    let mut active_light = None;
    let mut generation = shadow_data.generation();
    let projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 2000.0);

    for index in 0..args.frames {
        if args.realtime {
            clock.tick();
        } else {
            clock.advance(Duration::from_secs_f32(1.0 / 60.0));
        }
        let frame = clock.frame();
        let t = clock.elapsed_seconds();

        let ocean_scale = match args.zoom_every {
            Some(every) if (index / every) % 2 == 1 => 2.0,
            _ => 1.0,
        };
        let scale_difference_pow2 = scale_tracker.update(ocean_scale);
        let position = Vec3::new(t * 3.0, 12.0, t * 1.5);
        let forward = Vec3::new(0.2, -0.45, -1.0);
        transforms.update(frame, position, BASE_CASCADE_SCALE * ocean_scale);

        let light_index = match args.swap_light_at {
            Some(at) if index >= at => 1,
            _ => 0,
        };
        let light: &dyn ShadowCastingLight = &lights[light_index];
        if active_light.is_some_and(|id| id != light.id()) {
            stats.record_light_change();
        }
        active_light = Some(light.id());

        let camera = CameraMatrices::new(projection, Mat4::look_to_rh(position, forward, Vec3::Y));
        let outcome = shadow_data.update(ShadowUpdateParams {
            device: &mut device,
            pipeline: &mut hooks,
            transforms: &mut transforms,
            frame: ShadowFrame {
                frame,
                last_update_frame: if last_update_frame == 0 { frame } else { last_update_frame },
                delta_time: clock.delta_seconds(),
                process_data: config.enabled,
                light: Some(light),
                viewpoint: Some(Viewpoint::new(position, forward)),
                camera: Some(camera),
                lod,
                scale_difference_pow2,
            },
        });
        stats.record(outcome);
        last_update_frame = frame;
        if shadow_data.generation() != generation {
            stats.record_reallocation();
            generation = shadow_data.generation();
        }

        let Some(textures) = shadow_data.textures() else {
            continue;
        };
        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Shadow Probe Frame") });
        for work_list in hooks.work_lists(light.id(), SHADOW_DATA_STAGE) {
            kernel.execute(KernelExecuteParams {
                device: device.device(),
                queue: device.queue(),
                encoder: &mut encoder,
                textures,
                generation,
                work_list,
                shadow_input: &shadow_input,
            })?;
        }
        device.queue().submit(std::iter::once(encoder.finish()));
    }

    let mut samples = Vec::new();
    if let ShadowBinding::Cascades { array, cascade_count, .. } = shadow_data.binding(false) {
        for cascade in 0..cascade_count {
            let texels = read_layer(device.device(), device.queue(), array, cascade)?;
            samples.push(CascadeSample::from_texels(cascade, &texels));
        }
    }
    shadow_data.shutdown(&mut hooks);

    let mut summary =
        stats.summary("shadow_probe", format!("{}", SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs()));
    summary.cascade_samples = samples;
    summary.write_to_path(&args.output)?;
    log::info!(
        "[shadow] {} frames, {} processed, {} dispatches -> {}",
        summary.frame_count,
        summary.processed_frames,
        summary.total_dispatches,
        args.output.display()
    );
    Ok(())
}

/// A small checkerboard standing in for the light's screen-space shadow mask.
fn create_shadow_input(kernel: &mut UpdateShadowKernel, device: &GpuCascadeDevice) -> Result<wgpu::BindGroup> {
    let layout = kernel.shadow_input_layout(device.device())?;
    let size = wgpu::Extent3d { width: MASK_SIZE, height: MASK_SIZE, depth_or_array_layers: 1 };
    let texture = device.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Shadow Probe Mask"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let texels: Vec<u8> = (0..MASK_SIZE * MASK_SIZE)
        .flat_map(|index| {
            let lit = ((index % MASK_SIZE) + (index / MASK_SIZE)) % 2 == 0;
            let value = if lit { 255 } else { 0 };
            [value, value, value, 255]
        })
        .collect();
    device.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &texels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(MASK_SIZE * 4),
            rows_per_image: Some(MASK_SIZE),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.device().create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Shadow Probe Mask Sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    Ok(device.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Shadow Probe Mask BG"),
        layout: layout.as_ref(),
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
        ],
    }))
}
