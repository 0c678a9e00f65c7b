use std::time::{Duration, Instant};

/// Timing snapshot handed to layers once per frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub delta: f32,

    /// Seconds since the clock was created (unclamped).
    pub elapsed: f64,

    /// Monotonic frame counter, starting at 0.
    pub frame_index: u64,
}

impl FrameTime {
    /// A zero-length frame, used for callbacks that run outside the loop
    /// (attach/detach).
    pub fn zero() -> Self {
        Self {
            delta: 0.0,
            elapsed: 0.0,
            frame_index: 0,
        }
    }
}

/// Produces [`FrameTime`] snapshots for the application loop.
///
/// The delta is clamped so a debugger pause or a minimized window does not
/// hand a multi-second step to camera controllers.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    min_delta: Duration,
    max_delta: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(min_delta: Duration, max_delta: Duration) -> Self {
        debug_assert!(min_delta <= max_delta);
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            min_delta,
            max_delta,
        }
    }

    /// Moves the delta baseline to now without touching `elapsed`.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let delta = now
            .saturating_duration_since(self.last)
            .clamp(self.min_delta, self.max_delta);
        self.last = now;

        let time = FrameTime {
            delta: delta.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f64(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
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
    fn frame_index_counts_from_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick().frame_index, 0);
        assert_eq!(clock.tick().frame_index, 1);
        assert_eq!(clock.tick().frame_index, 2);
    }

    #[test]
    fn delta_is_clamped_to_max() {
        let mut clock = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(50));
        let later = clock.last + Duration::from_secs(3);
        let time = clock.tick_at(later);
        assert!((time.delta - 0.05).abs() < 1e-6);
        // Elapsed is not clamped.
        assert!(time.elapsed >= 3.0);
    }

    #[test]
    fn delta_is_clamped_to_min() {
        let mut clock = FrameClock::with_clamps(Duration::from_millis(2), Duration::from_millis(50));
        let same = clock.last;
        let time = clock.tick_at(same);
        assert!((time.delta - 0.002).abs() < 1e-6);
    }
}
