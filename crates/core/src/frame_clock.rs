//! Frame timing for the render loop.

use std::time::{Duration, Instant};

/// Measures per-frame deltas and aggregates a frames-per-second sample
/// roughly once per second.
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    sample_start: Instant,
    frames: u32,
}

impl FrameClock {
    /// Create a new clock, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            sample_start: now,
            frames: 0,
        }
    }

    /// Record a frame boundary, returning the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.frames += 1;
        delta
    }

    /// Average frames per second over the current sample window.
    ///
    /// Returns `None` until at least one second has elapsed since the last
    /// sample; returning a value resets the window.
    pub fn fps_sample(&mut self) -> Option<f32> {
        let elapsed = self.sample_start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.sample_start = Instant::now();
        Some(fps)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sample_before_a_second_elapses() {
        let mut clock = FrameClock::new();
        clock.tick();
        assert!(clock.fps_sample().is_none());
    }
}
