use std::time::{Duration, Instant};

/// Frame index and simulation delta handed to the shadow update each frame.
pub struct FrameClock {
    start: Instant,
    last: Instant,
    elapsed: Duration,
    frame: u64,
    pub delta: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, elapsed: Duration::ZERO, frame: 0, delta: Duration::ZERO }
    }

    /// Steps by the wall-clock time since the previous step.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last;
        self.last = now;
        self.elapsed = now.duration_since(self.start);
        self.frame += 1;
    }

    /// Steps by a fixed delta without consulting the wall clock.
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame += 1;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
