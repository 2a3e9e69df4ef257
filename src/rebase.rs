//! Cross-frame cascade reindexing under viewpoint scale changes.
//!
//! When the viewpoint climbs and the cascade rings grow by a power of two, the data that
//! today's cascade `i` needs was held last frame by cascade `i + 1`. Indices are clamped at
//! both ends, so the innermost and outermost cascades reuse their own edge data.

/// Previous-frame cascade that temporally feeds cascade `cascade` this frame.
pub fn source_cascade_index(cascade: usize, scale_difference_pow2: i32, cascade_count: usize) -> usize {
    if cascade_count == 0 {
        return 0;
    }
    let last = cascade_count as i64 - 1;
    (cascade as i64 + scale_difference_pow2 as i64).clamp(0, last) as usize
}

pub fn resolve_source_indices(scale_difference_pow2: i32, cascade_count: usize) -> Vec<usize> {
    (0..cascade_count)
        .map(|cascade| source_cascade_index(cascade, scale_difference_pow2, cascade_count))
        .collect()
}

/// Turns the ocean root scale sampled each frame into a signed power-of-two step count.
#[derive(Debug, Clone, Default)]
pub struct ScaleTracker {
    previous_scale: Option<f32>,
    difference_pow2: i32,
}

impl ScaleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records this frame's scale and returns the step count relative to the last sample.
    pub fn update(&mut self, scale: f32) -> i32 {
        if !scale.is_finite() || scale <= 0.0 {
            self.difference_pow2 = 0;
            return 0;
        }
        let previous = self.previous_scale.replace(scale).unwrap_or(scale);
        self.difference_pow2 = (scale / previous).log2().round() as i32;
        self.difference_pow2
    }

    pub fn scale_difference_pow2(&self) -> i32 {
        self.difference_pow2
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
