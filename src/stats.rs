use std::time::{Duration, Instant};

/// One reporting window worth of tick timings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub fps: f32,
    pub mean_tick_ms: f32,
}

/// Rolling frame counter; yields a report once per `window`.
pub struct FrameStats {
    window: Duration,
    window_start: Instant,
    frames: u32,
    busy: Duration,
}

impl FrameStats {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
            frames: 0,
            busy: Duration::ZERO,
        }
    }

    pub fn record(&mut self, tick_time: Duration) -> Option<FrameReport> {
        self.record_at(Instant::now(), tick_time)
    }

    pub fn record_at(&mut self, now: Instant, tick_time: Duration) -> Option<FrameReport> {
        self.frames += 1;
        self.busy += tick_time;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let report = FrameReport {
            fps: self.frames as f32 / elapsed.as_secs_f32(),
            mean_tick_ms: self.busy.as_secs_f32() * 1000.0 / self.frames as f32,
        };
        self.window_start = now;
        self.frames = 0;
        self.busy = Duration::ZERO;
        Some(report)
    }
}
