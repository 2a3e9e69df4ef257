//! Per-cascade parameter binding and dispatch recording, coarsest cascade first.

use glam::{Mat4, Vec3, Vec4};

use crate::cascade::{CascadeTransform, CascadeTransformRegistry, Staleness, ValidatedTransform};
use crate::config::ShadowSimSettings;
use crate::rebase::source_cascade_index;
use crate::texture_pair::{CascadeTextureDevice, TextureArrayPair};
use crate::work_list::{DispatchCommand, WorkList};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Viewpoint {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward: forward.normalize_or_zero() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub projection: Mat4,
    pub view: Mat4,
}

impl CameraMatrices {
    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self { projection, view }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Everything one cascade's update kernel reads. Built fresh per cascade per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchParameters {
    pub cascade: u32,
    pub source_cascade: u32,
    pub transform: CascadeTransform,
    /// Last frame's transform of `source_cascade`, for reprojecting history.
    pub source_transform: CascadeTransform,
    pub source_staleness: Staleness,
    pub viewpoint: Viewpoint,
    /// (soft jitter diameter, hard jitter diameter, soft weight, hard weight).
    pub jitter_diameters_current_frame_weights: Vec4,
    pub view_projection: Mat4,
    pub delta_time: f32,
    pub frame: u64,
}

/// Per-frame inputs shared by every cascade.
pub struct DispatchFrame<'a> {
    pub settings: &'a ShadowSimSettings,
    pub viewpoint: Viewpoint,
    pub camera: CameraMatrices,
    pub delta_time: f32,
    pub frame: u64,
    pub scale_difference_pow2: i32,
    /// Previous-frame transforms, already validated, indexed by cascade.
    pub sources: &'a [ValidatedTransform],
}

impl DispatchFrame<'_> {
    fn parameters(&self, cascade: usize, transform: CascadeTransform, cascade_count: usize) -> DispatchParameters {
        let source_cascade = source_cascade_index(cascade, self.scale_difference_pow2, cascade_count);
        let source = self.sources.get(source_cascade).copied().unwrap_or(ValidatedTransform {
            transform,
            staleness: Staleness::Fresh,
        });
        DispatchParameters {
            cascade: cascade as u32,
            source_cascade: source_cascade as u32,
            transform,
            source_transform: source.transform,
            source_staleness: source.staleness,
            viewpoint: self.viewpoint,
            jitter_diameters_current_frame_weights: Vec4::from_array(
                self.settings.jitter_diameters_current_frame_weights(),
            ),
            view_projection: self.camera.view_projection(),
            delta_time: self.delta_time,
            frame: self.frame,
        }
    }
}

/// Clears each target layer and records one dispatch per cascade, from `N-1` down to `0`.
///
/// The history array is whole-bound as the frame's source slot; this frame's targets are
/// never read, so cascades need no ordering between them.
pub fn record_cascades<D, R>(
    device: &mut D,
    textures: &TextureArrayPair<D::Array>,
    transforms: &mut R,
    work_list: &mut WorkList,
    frame: &DispatchFrame<'_>,
) -> usize
where
    D: CascadeTextureDevice + ?Sized,
    R: CascadeTransformRegistry + ?Sized,
{
    let cascade_count = textures.layer_count() as usize;
    let source = textures.source_slot();
    let target = textures.target_slot();
    for cascade in (0..cascade_count).rev() {
        // Left neutral if no shadow receivers are visible in this cascade this frame.
        textures.clear_target_layer(device, cascade as u32);

        let validated = transforms.validate(cascade, 0);
        let params = frame.parameters(cascade, validated.transform, cascade_count);
        work_list.push_dispatch(DispatchCommand { params, source, target });
    }
    cascade_count
}
