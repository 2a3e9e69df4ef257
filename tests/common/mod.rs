#![allow(dead_code)]

use glam::{Mat4, Vec3};
use ocean_shadow::cascade::LodTransforms;
use ocean_shadow::config::{LodConfig, ShadowSimSettings};
use ocean_shadow::dispatch::{CameraMatrices, Viewpoint};
use ocean_shadow::light::ShadowCastingLight;
use ocean_shadow::manager::{FrameOutcome, ShadowData, ShadowFrame, ShadowUpdateParams};
use ocean_shadow::texture_pair::{CascadeTextureDevice, TextureArrayDesc, TextureArrayPair, NEUTRAL_SHADOW};
use ocean_shadow::work_list::{LightHookTable, WorkList, SHADOW_DATA_STAGE};

/// Handle into [`CpuDevice`] storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuArray(pub usize);

#[derive(Debug)]
struct CpuArrayData {
    resolution: u32,
    layers: Vec<Vec<[f32; 4]>>,
}

/// Texture device backed by plain vectors. Records every clear and flush.
#[derive(Debug)]
pub struct CpuDevice {
    pub supported: bool,
    arrays: Vec<CpuArrayData>,
    pub clears: Vec<(CpuArray, u32)>,
    pub flushes: usize,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self { supported: true, arrays: Vec::new(), clears: Vec::new(), flushes: 0 }
    }

    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::new() }
    }

    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    pub fn fill_layer(&mut self, array: CpuArray, layer: u32, value: [f32; 4]) {
        let data = &mut self.arrays[array.0];
        data.layers[layer as usize].iter_mut().for_each(|texel| *texel = value);
    }

    pub fn layer(&self, array: CpuArray, layer: u32) -> &[[f32; 4]] {
        &self.arrays[array.0].layers[layer as usize]
    }

    pub fn texel(&self, array: CpuArray, layer: u32) -> [f32; 4] {
        self.layer(array, layer)[0]
    }

    pub fn is_neutral(&self, array: CpuArray) -> bool {
        self.arrays[array.0].layers.iter().flatten().all(|texel| *texel == NEUTRAL_SHADOW)
    }

    pub fn take_clears(&mut self) -> Vec<(CpuArray, u32)> {
        std::mem::take(&mut self.clears)
    }

    /// Stand-in for the update kernel: each target layer becomes its source layer plus one,
    /// tagged with the cascade and source cascade.
    pub fn execute(&mut self, textures: &TextureArrayPair<CpuArray>, list: &WorkList) {
        for command in list.dispatches() {
            let source = *textures.get(command.source);
            let target = *textures.get(command.target);
            let history = self.texel(source, command.params.source_cascade);
            let value = [
                history[0] + 1.0,
                history[1] + 1.0,
                command.params.cascade as f32,
                command.params.source_cascade as f32,
            ];
            self.fill_layer(target, command.params.cascade, value);
        }
    }
}

impl CascadeTextureDevice for CpuDevice {
    type Array = CpuArray;

    fn supports_format(&self, format: wgpu::TextureFormat) -> bool {
        self.supported && format == wgpu::TextureFormat::Rgba16Float
    }

    fn create_array(&mut self, desc: &TextureArrayDesc) -> CpuArray {
        let texels = (desc.resolution * desc.resolution) as usize;
        // Garbage so tests can tell cleared layers apart.
        let layers = vec![vec![[f32::NAN; 4]; texels]; desc.layer_count as usize];
        self.arrays.push(CpuArrayData { resolution: desc.resolution, layers });
        CpuArray(self.arrays.len() - 1)
    }

    fn clear_layer(&mut self, array: &CpuArray, layer: u32) {
        self.fill_layer(*array, layer, NEUTRAL_SHADOW);
        self.clears.push((*array, layer));
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

/// Drives a [`ShadowData`] against the CPU device and a host hook table, one frame per step.
pub struct Harness {
    pub device: CpuDevice,
    pub hooks: LightHookTable,
    pub transforms: LodTransforms,
    pub shadow: ShadowData<CpuArray>,
    pub lod: LodConfig,
    pub frame: u64,
    pub process_data: bool,
    pub scale_difference_pow2: i32,
    pub camera: bool,
    /// When false, the registry keeps last frame's snapshots.
    pub update_transforms: bool,
}

impl Harness {
    pub fn new(settings: ShadowSimSettings, lod: LodConfig) -> Self {
        Self::with_device(CpuDevice::new(), settings, lod)
    }

    pub fn with_device(device: CpuDevice, settings: ShadowSimSettings, lod: LodConfig) -> Self {
        Self {
            device,
            hooks: LightHookTable::new(),
            transforms: LodTransforms::new(lod.cascade_count as usize, lod.resolution),
            shadow: ShadowData::new(settings),
            lod,
            frame: 0,
            process_data: true,
            scale_difference_pow2: 0,
            camera: true,
            update_transforms: true,
        }
    }

    pub fn step(&mut self, light: Option<&dyn ShadowCastingLight>) -> FrameOutcome {
        self.frame += 1;
        let position = Vec3::new(self.frame as f32 * 0.5, 0.0, 0.0);
        if self.update_transforms {
            self.transforms.update(self.frame, position, 4.0);
        }
        let forward = Vec3::new(0.0, -0.5, -1.0);
        let camera = CameraMatrices::new(
            Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0),
            Mat4::look_to_rh(position, forward, Vec3::Y),
        );
        self.shadow.update(ShadowUpdateParams {
            device: &mut self.device,
            pipeline: &mut self.hooks,
            transforms: &mut self.transforms,
            frame: ShadowFrame {
                frame: self.frame,
                last_update_frame: self.frame.saturating_sub(1).max(1),
                delta_time: 1.0 / 60.0,
                process_data: self.process_data,
                light,
                viewpoint: self.camera.then(|| Viewpoint::new(position, forward)),
                camera: self.camera.then_some(camera),
                lod: self.lod,
                scale_difference_pow2: self.scale_difference_pow2,
            },
        })
    }

    /// Steps, then runs whatever work-lists the host holds for `light` at the shadow data stage.
    pub fn step_and_execute(&mut self, light: &dyn ShadowCastingLight) -> FrameOutcome {
        let outcome = self.step(Some(light));
        if let Some(textures) = self.shadow.textures() {
            for list in self.hooks.work_lists(light.id(), SHADOW_DATA_STAGE) {
                self.device.execute(textures, list);
            }
        }
        outcome
    }

    pub fn work_list(&self, light: &dyn ShadowCastingLight) -> Option<&WorkList> {
        self.hooks.work_lists(light.id(), SHADOW_DATA_STAGE).next()
    }

    pub fn textures(&self) -> &TextureArrayPair<CpuArray> {
        self.shadow.textures().expect("textures allocated")
    }
}
