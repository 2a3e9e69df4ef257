use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound on the number of cascades the viewpoint tracker may request.
pub const MAX_CASCADES: u32 = 15;
pub const MIN_CASCADE_RESOLUTION: u32 = 16;
pub const MAX_CASCADE_RESOLUTION: u32 = 4096;

/// Jitter and temporal weights consumed by the shadow update kernel, plus the null-light policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSimSettings {
    /// Jitter extent in world units for the soft channel. Larger values give softer shadows.
    #[serde(default = "ShadowSimSettings::default_jitter_diameter_soft")]
    pub jitter_diameter_soft: f32,
    #[serde(default = "ShadowSimSettings::default_jitter_diameter_hard")]
    pub jitter_diameter_hard: f32,
    /// Blend factor between this frame's soft sample and the accumulated history.
    #[serde(default = "ShadowSimSettings::default_current_frame_weight_soft")]
    pub current_frame_weight_soft: f32,
    #[serde(default = "ShadowSimSettings::default_current_frame_weight_hard")]
    pub current_frame_weight_hard: f32,
    /// Suppresses the missing-light warning when the ocean is meant to render unshadowed.
    #[serde(default)]
    pub allow_null_light: bool,
}

impl ShadowSimSettings {
    const fn default_jitter_diameter_soft() -> f32 {
        15.0
    }

    const fn default_jitter_diameter_hard() -> f32 {
        0.6
    }

    const fn default_current_frame_weight_soft() -> f32 {
        0.03
    }

    const fn default_current_frame_weight_hard() -> f32 {
        0.15
    }

    pub fn sanitized(self) -> Self {
        Self {
            jitter_diameter_soft: clamp_finite(self.jitter_diameter_soft, 0.0, 32.0),
            jitter_diameter_hard: clamp_finite(self.jitter_diameter_hard, 0.0, 15.0),
            current_frame_weight_soft: clamp_finite(self.current_frame_weight_soft, 0.0, 1.0),
            current_frame_weight_hard: clamp_finite(self.current_frame_weight_hard, 0.0, 1.0),
            allow_null_light: self.allow_null_light,
        }
    }

    /// Packed as (soft jitter, hard jitter, soft weight, hard weight), the layout the kernel reads.
    pub fn jitter_diameters_current_frame_weights(&self) -> [f32; 4] {
        [
            self.jitter_diameter_soft,
            self.jitter_diameter_hard,
            self.current_frame_weight_soft,
            self.current_frame_weight_hard,
        ]
    }
}

impl Default for ShadowSimSettings {
    fn default() -> Self {
        Self {
            jitter_diameter_soft: Self::default_jitter_diameter_soft(),
            jitter_diameter_hard: Self::default_jitter_diameter_hard(),
            current_frame_weight_soft: Self::default_current_frame_weight_soft(),
            current_frame_weight_hard: Self::default_current_frame_weight_hard(),
            allow_null_light: false,
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

/// Cascade dimensions published by the viewpoint tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodConfig {
    #[serde(default = "LodConfig::default_cascade_count")]
    pub cascade_count: u32,
    #[serde(default = "LodConfig::default_resolution")]
    pub resolution: u32,
}

impl LodConfig {
    const fn default_cascade_count() -> u32 {
        7
    }

    const fn default_resolution() -> u32 {
        256
    }

    pub fn new(cascade_count: u32, resolution: u32) -> Self {
        Self { cascade_count, resolution }.sanitized()
    }

    pub fn sanitized(self) -> Self {
        Self {
            cascade_count: self.cascade_count.clamp(1, MAX_CASCADES),
            resolution: self.resolution.clamp(MIN_CASCADE_RESOLUTION, MAX_CASCADE_RESOLUTION),
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self { cascade_count: Self::default_cascade_count(), resolution: Self::default_resolution() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowDataConfig {
    #[serde(default = "ShadowDataConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: ShadowSimSettings,
    #[serde(default)]
    pub lod: LodConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ShadowDataConfigOverrides {
    pub enabled: Option<bool>,
    pub allow_null_light: Option<bool>,
    pub cascade_count: Option<u32>,
    pub resolution: Option<u32>,
}

impl ShadowDataConfig {
    const fn default_enabled() -> bool {
        true
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: ShadowDataConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("[shadow] config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn sanitized(self) -> Self {
        Self { enabled: self.enabled, settings: self.settings.sanitized(), lod: self.lod.sanitized() }
    }

    pub fn apply_overrides(&mut self, overrides: &ShadowDataConfigOverrides) {
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(allow) = overrides.allow_null_light {
            self.settings.allow_null_light = allow;
        }
        if let Some(count) = overrides.cascade_count {
            self.lod.cascade_count = count;
        }
        if let Some(resolution) = overrides.resolution {
            self.lod.resolution = resolution;
        }
        self.lod = self.lod.sanitized();
    }
}

impl Default for ShadowDataConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            settings: ShadowSimSettings::default(),
            lod: LodConfig::default(),
        }
    }
}

impl ShadowDataConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.allow_null_light.is_none()
            && self.cascade_count.is_none()
            && self.resolution.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.enabled.is_some() {
            fields.push("enabled");
        }
        if self.allow_null_light.is_some() {
            fields.push("allow_null_light");
        }
        if self.cascade_count.is_some() {
            fields.push("cascade_count");
        }
        if self.resolution.is_some() {
            fields.push("resolution");
        }
        fields
    }
}
