//! Frame rate statistics.

use tracing::info;

/// Min/max/average FPS over the run.
#[derive(Debug, Clone)]
pub struct FrameStats {
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
    samples: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
            samples: 0,
        }
    }
}

impl FrameStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame's delta time in seconds. Zero deltas are ignored.
    pub fn record(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let fps = 1.0 / f64::from(dt);
        self.min_fps = self.min_fps.min(fps);
        self.max_fps = self.max_fps.max(fps);
        self.fps_sum += fps;
        self.samples += 1;
    }

    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    #[must_use]
    pub fn min_fps(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.min_fps)
    }

    #[must_use]
    pub fn max_fps(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.max_fps)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.fps_sum / self.samples as f64)
    }

    /// Log the summary, if any frames were recorded.
    pub fn log_summary(&self, total_frames: u64) {
        let (Some(min), Some(max), Some(avg)) =
            (self.min_fps(), self.max_fps(), self.average_fps())
        else {
            return;
        };
        info!("FPS Statistics:");
        info!("  Min: {:.1}", min);
        info!("  Max: {:.1}", max);
        info!("  Avg: {:.1}", avg);
        info!("  Total frames: {}", total_frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_stats_have_no_summary() {
        let stats = FrameStats::new();
        assert_eq!(stats.samples(), 0);
        assert!(stats.average_fps().is_none());
    }

    #[test]
    fn tracks_min_max_and_average() {
        let mut stats = FrameStats::new();
        stats.record(0.01);
        stats.record(0.02);
        stats.record(0.0);

        assert_eq!(stats.samples(), 2);
        assert_relative_eq!(stats.max_fps().unwrap(), 100.0, epsilon = 1e-3);
        assert_relative_eq!(stats.min_fps().unwrap(), 50.0, epsilon = 1e-3);
        assert_relative_eq!(stats.average_fps().unwrap(), 75.0, epsilon = 1e-3);
    }
}
