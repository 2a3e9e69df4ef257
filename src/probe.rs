use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::manager::FrameOutcome;

/// Tallies per-frame outcomes of a shadow data run and produces a serialized summary.
#[derive(Debug, Default)]
pub struct ShadowFrameStats {
    frames: usize,
    processed: usize,
    paused: usize,
    no_light: usize,
    light_rejected: usize,
    mismatched: usize,
    disabled: usize,
    dispatches: usize,
    max_dispatches: usize,
    light_changes: usize,
    reallocations: usize,
}

impl ShadowFrameStats {
    pub fn record(&mut self, outcome: FrameOutcome) {
        self.frames += 1;
        match outcome {
            FrameOutcome::Processed { dispatches } => {
                self.processed += 1;
                self.dispatches += dispatches;
                self.max_dispatches = self.max_dispatches.max(dispatches);
            }
            FrameOutcome::Paused => self.paused += 1,
            FrameOutcome::NoLight => self.no_light += 1,
            FrameOutcome::LightRejected => self.light_rejected += 1,
            FrameOutcome::TransformsMismatch { .. } => self.mismatched += 1,
            FrameOutcome::Disabled => self.disabled += 1,
        }
    }

    pub fn record_light_change(&mut self) {
        self.light_changes += 1;
    }

    pub fn record_reallocation(&mut self) {
        self.reallocations += 1;
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn summary(&self, label: impl Into<String>, timestamp: impl Into<String>) -> ShadowProbeSummary {
        let average_dispatches =
            if self.processed == 0 { 0.0 } else { self.dispatches as f32 / self.processed as f32 };
        ShadowProbeSummary {
            label: label.into(),
            timestamp: timestamp.into(),
            frame_count: self.frames,
            processed_frames: self.processed,
            paused_frames: self.paused,
            no_light_frames: self.no_light,
            rejected_light_frames: self.light_rejected,
            mismatched_frames: self.mismatched,
            disabled_frames: self.disabled,
            total_dispatches: self.dispatches,
            max_dispatches_per_frame: self.max_dispatches,
            average_dispatches_per_frame: average_dispatches,
            light_changes: self.light_changes,
            reallocations: self.reallocations,
            cascade_samples: Vec::new(),
        }
    }
}

/// Mean soft/hard shadowing of one cascade layer, read back at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CascadeSample {
    pub cascade: u32,
    pub mean_soft: f32,
    pub mean_hard: f32,
}

impl CascadeSample {
    pub fn from_texels(cascade: u32, texels: &[[f32; 4]]) -> Self {
        if texels.is_empty() {
            return Self { cascade, mean_soft: 0.0, mean_hard: 0.0 };
        }
        let (soft, hard) = texels
            .iter()
            .fold((0.0f32, 0.0f32), |(soft, hard), texel| (soft + texel[0], hard + texel[1]));
        let count = texels.len() as f32;
        Self { cascade, mean_soft: soft / count, mean_hard: hard / count }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShadowProbeSummary {
    pub label: String,
    pub timestamp: String,
    pub frame_count: usize,
    pub processed_frames: usize,
    pub paused_frames: usize,
    pub no_light_frames: usize,
    pub rejected_light_frames: usize,
    #[serde(default)]
    pub mismatched_frames: usize,
    pub disabled_frames: usize,
    pub total_dispatches: usize,
    pub max_dispatches_per_frame: usize,
    pub average_dispatches_per_frame: f32,
    pub light_changes: usize,
    pub reallocations: usize,
    #[serde(default)]
    pub cascade_samples: Vec<CascadeSample>,
}

impl ShadowProbeSummary {
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, format!("{json}\n")).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let summary = serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
        Ok(summary)
    }
}
