//! Frame orchestration for the persistent ocean shadow field.
//!
//! Per frame: resolve the light binding, keep exactly one work-list hooked into that light
//! while processing is enabled, swap the texture roles, then record one dispatch per cascade.

use crate::cascade::{CascadeTransformRegistry, ValidatedTransform};
use crate::config::{LodConfig, ShadowSimSettings};
use crate::diagnostics::FailureReports;
use crate::dispatch::{record_cascades, CameraMatrices, DispatchFrame, Viewpoint};
use crate::error::ShadowDataError;
use crate::hook::{HookController, HookState};
use crate::light::{validate_light, LightId, ShadowCastingLight};
use crate::texture_pair::{ArraySlot, CascadeTextureDevice, TextureArrayDesc, TextureArrayPair};
use crate::work_list::LightPipeline;

/// Inputs observed at the start of a frame.
#[derive(Clone, Copy)]
pub struct ShadowFrame<'a> {
    pub frame: u64,
    /// Frame on which the source (previous-frame) cascade transforms were captured.
    pub last_update_frame: u64,
    pub delta_time: f32,
    /// Global processing toggle; read once per update.
    pub process_data: bool,
    pub light: Option<&'a dyn ShadowCastingLight>,
    pub viewpoint: Option<Viewpoint>,
    pub camera: Option<CameraMatrices>,
    pub lod: LodConfig,
    pub scale_difference_pow2: i32,
}

pub struct ShadowUpdateParams<'a, D: ?Sized, P: ?Sized, R: ?Sized> {
    pub device: &'a mut D,
    pub pipeline: &'a mut P,
    pub transforms: &'a mut R,
    pub frame: ShadowFrame<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Processed { dispatches: usize },
    /// Processing is toggled off; textures keep their contents.
    Paused,
    NoLight,
    LightRejected,
    /// The transform registry and the texture arrays disagree on the cascade count; nothing recorded.
    TransformsMismatch { registry: usize, cascades: u32 },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowDataStatus {
    Active,
    Disabled(ShadowDataError),
}

/// What the shading stage binds to read accumulated shadowing.
pub enum ShadowBinding<'a, A> {
    Cascades { array: &'a A, slot: ArraySlot, cascade_count: u32 },
    /// Bind an all-lit placeholder array instead.
    Null,
}

impl<A> ShadowBinding<'_, A> {
    pub fn is_null(&self) -> bool {
        matches!(self, ShadowBinding::Null)
    }
}

pub struct ShadowData<A> {
    settings: ShadowSimSettings,
    textures: Option<TextureArrayPair<A>>,
    generation: u64,
    hook: HookController,
    bound_light: Option<LightId>,
    rejected_light: Option<(LightId, ShadowDataError)>,
    status: ShadowDataStatus,
    reports: FailureReports,
}

impl<A> ShadowData<A> {
    pub fn new(settings: ShadowSimSettings) -> Self {
        Self {
            settings: settings.sanitized(),
            textures: None,
            generation: 0,
            hook: HookController::new(),
            bound_light: None,
            rejected_light: None,
            status: ShadowDataStatus::Active,
            reports: FailureReports::new(),
        }
    }

    pub fn settings(&self) -> &ShadowSimSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ShadowSimSettings) {
        self.settings = settings.sanitized();
    }

    pub fn status(&self) -> &ShadowDataStatus {
        &self.status
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.status, ShadowDataStatus::Disabled(_))
    }

    pub fn reports(&self) -> &FailureReports {
        &self.reports
    }

    pub fn hook_state(&self) -> HookState {
        self.hook.state()
    }

    pub fn bound_light(&self) -> Option<LightId> {
        self.bound_light
    }

    pub fn textures(&self) -> Option<&TextureArrayPair<A>> {
        self.textures.as_ref()
    }

    /// Bumped whenever the texture arrays are reallocated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Allocates both texture arrays for `lod`. An unsupported format disables the component.
    pub fn init<D>(&mut self, device: &mut D, lod: LodConfig) -> Result<(), ShadowDataError>
    where
        D: CascadeTextureDevice<Array = A> + ?Sized,
    {
        if let ShadowDataStatus::Disabled(err) = &self.status {
            return Err(err.clone());
        }
        match TextureArrayPair::allocate(device, TextureArrayDesc::shadow(lod.sanitized())) {
            Ok(pair) => {
                device.flush();
                self.textures = Some(pair);
                self.generation += 1;
                Ok(())
            }
            Err(err) => {
                self.disable(err.clone());
                Err(err)
            }
        }
    }

    pub fn update<D, P, R>(&mut self, params: ShadowUpdateParams<'_, D, P, R>) -> FrameOutcome
    where
        D: CascadeTextureDevice<Array = A> + ?Sized,
        P: LightPipeline + ?Sized,
        R: CascadeTransformRegistry + ?Sized,
    {
        let ShadowUpdateParams { device, pipeline, transforms, frame } = params;
        if self.is_disabled() {
            return FrameOutcome::Disabled;
        }
        let (Some(viewpoint), Some(camera)) = (frame.viewpoint, frame.camera) else {
            self.hook.detach(pipeline);
            self.disable(ShadowDataError::MissingCamera);
            return FrameOutcome::Disabled;
        };

        let lod = frame.lod.sanitized();
        if !self.textures.as_ref().is_some_and(|textures| textures.matches(lod)) {
            if let Some(textures) = self.textures.as_ref() {
                log::info!(
                    "[shadow] reallocating cascades: {}x{} -> {}x{}",
                    textures.layer_count(),
                    textures.resolution(),
                    lod.cascade_count,
                    lod.resolution
                );
            }
            if self.init(device, lod).is_err() {
                self.hook.detach(pipeline);
                return FrameOutcome::Disabled;
            }
        }

        let observed = frame.light.map(|light| light.id());
        if self.bound_light.is_some() && self.bound_light != observed {
            self.release_light(device, pipeline);
        }
        if let Some((rejected, err)) = self.rejected_light.take() {
            if Some(rejected) == observed {
                self.rejected_light = Some((rejected, err));
            } else {
                self.reports.resolve(&err);
            }
        }

        let Some(light) = frame.light else {
            if !self.settings.allow_null_light {
                self.reports.report(&ShadowDataError::MissingLight);
            }
            return FrameOutcome::NoLight;
        };
        self.reports.resolve(&ShadowDataError::MissingLight);

        let light_id = light.id();
        if self.bound_light.is_none() {
            if self.rejected_light.as_ref().is_some_and(|(rejected, _)| *rejected == light_id) {
                return FrameOutcome::LightRejected;
            }
            if let Err(err) = validate_light(light) {
                self.reports.report(&err);
                self.rejected_light = Some((light_id, err));
                return FrameOutcome::LightRejected;
            }
            self.bound_light = Some(light_id);
        }

        if !frame.process_data {
            if self.hook.detach(pipeline) {
                log::debug!("[shadow] processing disabled, detached from light {light_id}");
            }
            return FrameOutcome::Paused;
        }

        self.hook.attach(pipeline, light_id);
        let Some(work_list) = self.hook.work_list(pipeline) else {
            return FrameOutcome::Paused;
        };
        let Some(textures) = self.textures.as_mut() else {
            return FrameOutcome::Disabled;
        };

        work_list.clear();
        let registry = transforms.cascade_count();
        let cascades = textures.layer_count();
        if registry != cascades as usize {
            self.reports.report(&ShadowDataError::CascadeCountMismatch { registry, cascades });
            return FrameOutcome::TransformsMismatch { registry, cascades };
        }
        self.reports.resolve_matching(|err| matches!(err, ShadowDataError::CascadeCountMismatch { .. }));

        textures.swap();

        if transforms.current_frame() != frame.frame {
            log::debug!(
                "[shadow] transform registry is at frame {} while updating frame {}",
                transforms.current_frame(),
                frame.frame
            );
        }
        let frame_offset = frame.last_update_frame as i64 - frame.frame as i64;
        let sources: Vec<ValidatedTransform> = (0..textures.layer_count() as usize)
            .map(|cascade| transforms.validate_source(cascade, frame_offset))
            .collect();
        let dispatch_frame = DispatchFrame {
            settings: &self.settings,
            viewpoint,
            camera,
            delta_time: frame.delta_time,
            frame: frame.frame,
            scale_difference_pow2: frame.scale_difference_pow2,
            sources: &sources,
        };
        let dispatches = record_cascades(device, textures, transforms, work_list, &dispatch_frame);
        device.flush();
        FrameOutcome::Processed { dispatches }
    }

    /// Detaches from the light without touching texture contents.
    pub fn shutdown<P>(&mut self, pipeline: &mut P)
    where
        P: LightPipeline + ?Sized,
    {
        self.hook.detach(pipeline);
    }

    /// The array the shading stage should sample: this frame's results, or last frame's with `source`.
    pub fn binding(&self, source: bool) -> ShadowBinding<'_, A> {
        match (&self.status, self.textures.as_ref()) {
            (ShadowDataStatus::Active, Some(textures)) => {
                let slot = if source { textures.source_slot() } else { textures.target_slot() };
                ShadowBinding::Cascades { array: textures.get(slot), slot, cascade_count: textures.layer_count() }
            }
            _ => ShadowBinding::Null,
        }
    }

    /// Stale shadowing from a different light must never leak into the next one's accumulation.
    fn release_light<D, P>(&mut self, device: &mut D, pipeline: &mut P)
    where
        D: CascadeTextureDevice<Array = A> + ?Sized,
        P: LightPipeline + ?Sized,
    {
        if let Some(textures) = self.textures.as_ref() {
            textures.clear_all(device);
            device.flush();
        }
        self.hook.detach(pipeline);
        self.bound_light = None;
    }

    fn disable(&mut self, err: ShadowDataError) {
        self.reports.report(&err);
        if err.disables_component() {
            self.status = ShadowDataStatus::Disabled(err);
        }
    }
}
