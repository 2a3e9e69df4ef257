//! Per-cascade world transforms ("render data") and their frame validation.
//!
//! Each cascade `i` covers a square region centred on the viewpoint whose size doubles with
//! every index. Positions are snapped to the cascade texel grid so that texels stay
//! world-stable while the viewpoint moves.

use glam::Vec3;

/// A source snapshot up to this many frames older than expected is `Stale`; beyond it is `Expired`.
pub const STALE_TRANSFORM_HORIZON: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeTransform {
    /// World-space centre, snapped to the cascade texel grid.
    pub position: Vec3,
    pub scale: Vec3,
    /// Frame the snapshot was computed on.
    pub frame: u64,
    pub last_validated_frame: u64,
}

impl CascadeTransform {
    pub fn new(position: Vec3, scale: Vec3, frame: u64) -> Self {
        Self { position, scale, frame, last_validated_frame: frame }
    }

    /// Width of the world region covered by the cascade texture.
    pub fn world_extent(&self) -> f32 {
        4.0 * self.scale.x
    }

    pub fn texel_width(&self, resolution: u32) -> f32 {
        self.world_extent() / resolution.max(1) as f32
    }
}

impl Default for CascadeTransform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale { frames: u64 },
    Expired { frames: u64 },
}

impl Staleness {
    /// Classifies a snapshot computed on `snapshot_frame` that was expected on `expected_frame`.
    pub fn classify(snapshot_frame: u64, expected_frame: u64) -> Self {
        let frames = expected_frame.abs_diff(snapshot_frame);
        if frames == 0 {
            Staleness::Fresh
        } else if frames <= STALE_TRANSFORM_HORIZON {
            Staleness::Stale { frames }
        } else {
            Staleness::Expired { frames }
        }
    }

    pub fn is_fresh(self) -> bool {
        matches!(self, Staleness::Fresh)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedTransform {
    pub transform: CascadeTransform,
    pub staleness: Staleness,
}

/// Source of per-cascade transforms, owned by the viewpoint tracker.
///
/// `frame_offset` is relative to the registry's current frame: `0` expects a snapshot computed
/// this frame, negative values expect older ones. Validation stamps the snapshot in place.
pub trait CascadeTransformRegistry {
    fn cascade_count(&self) -> usize;
    fn current_frame(&self) -> u64;
    fn validate(&mut self, cascade: usize, frame_offset: i64) -> ValidatedTransform;
    /// Validates the previous-frame snapshot that temporal reads sample from.
    fn validate_source(&mut self, cascade: usize, frame_offset: i64) -> ValidatedTransform;
}

/// Reference registry: cascade `i` has scale `base_scale * 2^i` around the viewpoint.
#[derive(Debug, Clone)]
pub struct LodTransforms {
    resolution: u32,
    current_frame: u64,
    render_data: Vec<CascadeTransform>,
    render_data_source: Vec<CascadeTransform>,
    initialised: bool,
}

impl LodTransforms {
    pub fn new(cascade_count: usize, resolution: u32) -> Self {
        let count = cascade_count.max(1);
        Self {
            resolution: resolution.max(1),
            current_frame: 0,
            render_data: vec![CascadeTransform::default(); count],
            render_data_source: vec![CascadeTransform::default(); count],
            initialised: false,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Changes cascade count or resolution. History is discarded.
    pub fn resize(&mut self, cascade_count: usize, resolution: u32) {
        *self = Self { current_frame: self.current_frame, ..Self::new(cascade_count, resolution) };
    }

    /// Moves this frame's snapshots into the source set and computes new ones.
    pub fn update(&mut self, frame: u64, viewpoint: Vec3, base_scale: f32) {
        if self.initialised {
            self.render_data_source.copy_from_slice(&self.render_data);
        }
        let base_scale = if base_scale.is_finite() && base_scale > 0.0 { base_scale } else { 1.0 };
        for (index, data) in self.render_data.iter_mut().enumerate() {
            let scale = base_scale * (1u32 << index.min(31)) as f32;
            let mut next = CascadeTransform::new(Vec3::ZERO, Vec3::splat(scale), frame);
            let texel = next.texel_width(self.resolution);
            next.position = snap_to_texel_grid(viewpoint, texel);
            *data = next;
        }
        if !self.initialised {
            self.render_data_source.copy_from_slice(&self.render_data);
            self.initialised = true;
        }
        self.current_frame = frame;
    }

    pub fn render_data(&self, cascade: usize) -> Option<&CascadeTransform> {
        self.render_data.get(cascade)
    }

    pub fn source_data(&self, cascade: usize) -> Option<&CascadeTransform> {
        self.render_data_source.get(cascade)
    }
}

impl CascadeTransformRegistry for LodTransforms {
    fn cascade_count(&self) -> usize {
        self.render_data.len()
    }

    fn current_frame(&self) -> u64 {
        self.current_frame
    }

    fn validate(&mut self, cascade: usize, frame_offset: i64) -> ValidatedTransform {
        let expected = offset_frame(self.current_frame, frame_offset);
        let current = self.current_frame;
        let index = cascade.min(self.render_data.len() - 1);
        validate_in_place(&mut self.render_data[index], expected, current)
    }

    fn validate_source(&mut self, cascade: usize, frame_offset: i64) -> ValidatedTransform {
        let expected = offset_frame(self.current_frame, frame_offset);
        let current = self.current_frame;
        let index = cascade.min(self.render_data_source.len() - 1);
        validate_in_place(&mut self.render_data_source[index], expected, current)
    }
}

fn offset_frame(frame: u64, offset: i64) -> u64 {
    if offset >= 0 {
        frame.saturating_add(offset as u64)
    } else {
        frame.saturating_sub(offset.unsigned_abs())
    }
}

fn validate_in_place(data: &mut CascadeTransform, expected: u64, current: u64) -> ValidatedTransform {
    let staleness = Staleness::classify(data.frame, expected);
    if !staleness.is_fresh() {
        log::debug!(
            "[shadow] cascade transform from frame {} validated against frame {} ({staleness:?})",
            data.frame,
            expected
        );
    }
    data.last_validated_frame = current;
    ValidatedTransform { transform: *data, staleness }
}

/// Snaps `position` down to the nearest multiple of `texel` on the horizontal plane.
pub fn snap_to_texel_grid(position: Vec3, texel: f32) -> Vec3 {
    if texel <= 0.0 || !texel.is_finite() {
        return position;
    }
    Vec3::new(
        position.x - position.x.rem_euclid(texel),
        position.y,
        position.z - position.z.rem_euclid(texel),
    )
}
