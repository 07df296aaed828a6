//! Frame budget, slow-frame aggregation and periodic throughput logs.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const NO_POSE_LOG_EVERY: u64 = 150;
const LOW_FPS: f64 = 15.0;
const BELOW_TARGET_FPS: f64 = 25.0;

/// Numbers for one stats window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub frames: u64,
    pub slow_frames: u64,
    pub fps: f64,
}

#[derive(Debug)]
pub struct FrameTiming {
    budget: Duration,
    slow_threshold: Duration,
    stats_interval: Duration,
    window_start: Instant,
    window_frames: u64,
    window_slow: u64,
    total_frames: u64,
    missing_streak: u64,
}

impl FrameTiming {
    pub fn new(target_fps: u32, slow_margin: f32, stats_interval: Duration, now: Instant) -> Self {
        let budget = Duration::from_nanos(1_000_000_000 / u64::from(target_fps.max(1)));
        let margin = if slow_margin.is_finite() {
            slow_margin.clamp(1.0, 10.0)
        } else {
            1.0
        };
        Self {
            budget,
            slow_threshold: budget.mul_f32(margin),
            stats_interval,
            window_start: now,
            window_frames: 0,
            window_slow: 0,
            total_frames: 0,
            missing_streak: 0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Records a processed frame and returns how long to sleep until the next.
    pub fn record(&mut self, elapsed: Duration) -> Duration {
        self.window_frames += 1;
        self.total_frames += 1;
        if elapsed > self.slow_threshold {
            self.window_slow += 1;
        }
        self.budget.saturating_sub(elapsed)
    }

    /// Logs and resets the window once `stats_interval` has passed.
    pub fn report_if_due(&mut self, now: Instant) -> Option<WindowStats> {
        let window = now.saturating_duration_since(self.window_start);
        if window < self.stats_interval || window.is_zero() {
            return None;
        }

        let stats = WindowStats {
            frames: self.window_frames,
            slow_frames: self.window_slow,
            fps: self.window_frames as f64 / window.as_secs_f64(),
        };

        if stats.fps < LOW_FPS {
            warn!(
                "Low frame rate: {:.1} fps ({} frames, {} slow)",
                stats.fps, stats.frames, stats.slow_frames
            );
        } else if stats.fps < BELOW_TARGET_FPS {
            info!(
                "Frame rate below target: {:.1} fps ({} frames, {} slow)",
                stats.fps, stats.frames, stats.slow_frames
            );
        } else {
            info!(
                "Processing at {:.1} fps ({} frames, {} slow)",
                stats.fps, stats.frames, stats.slow_frames
            );
        }
        if stats.slow_frames > 0 {
            debug!(
                "{} frames exceeded {:.1}ms",
                stats.slow_frames,
                self.slow_threshold.as_secs_f64() * 1000.0
            );
        }

        self.window_start = now;
        self.window_frames = 0;
        self.window_slow = 0;
        Some(stats)
    }

    pub fn pose_missing(&mut self) {
        self.missing_streak += 1;
        if self.missing_streak % NO_POSE_LOG_EVERY == 0 {
            debug!("No pose detected for {} frames", self.missing_streak);
        }
    }

    pub fn pose_present(&mut self) {
        if self.missing_streak > 0 {
            debug!("Pose detected again after {} frames", self.missing_streak);
            self.missing_streak = 0;
        }
    }

    pub fn missing_streak(&self) -> u64 {
        self.missing_streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeps_the_rest_of_the_budget() {
        let mut timing = FrameTiming::new(20, 1.5, Duration::from_secs(5), Instant::now());
        assert_eq!(timing.budget(), Duration::from_millis(50));
        assert_eq!(timing.record(Duration::from_millis(20)), Duration::from_millis(30));
        assert_eq!(timing.record(Duration::from_millis(90)), Duration::ZERO);
    }

    #[test]
    fn slow_frames_are_aggregated_per_window() {
        let start = Instant::now();
        let mut timing = FrameTiming::new(20, 1.5, Duration::from_secs(5), start);

        timing.record(Duration::from_millis(10));
        timing.record(Duration::from_millis(70)); // within the 75ms margin
        timing.record(Duration::from_millis(80));
        timing.record(Duration::from_millis(200));

        assert_eq!(timing.report_if_due(start + Duration::from_secs(1)), None);

        let stats = timing.report_if_due(start + Duration::from_secs(5)).unwrap();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.slow_frames, 2);
        assert!((stats.fps - 0.8).abs() < 1e-9);

        let next = timing.report_if_due(start + Duration::from_secs(10)).unwrap();
        assert_eq!(next.frames, 0);
        assert_eq!(next.slow_frames, 0);
        assert_eq!(timing.total_frames(), 4);
    }

    #[test]
    fn unusable_margins_still_give_a_threshold() {
        for margin in [f32::INFINITY, f32::NAN, 1e30, -3.0] {
            let mut timing = FrameTiming::new(20, margin, Duration::from_secs(5), Instant::now());
            timing.record(Duration::from_millis(600));
            let stats = timing.report_if_due(Instant::now() + Duration::from_secs(5)).unwrap();
            assert_eq!(stats.slow_frames, 1);
        }
    }

    #[test]
    fn missing_pose_streak_resets() {
        let mut timing = FrameTiming::new(30, 1.5, Duration::from_secs(5), Instant::now());
        for _ in 0..151 {
            timing.pose_missing();
        }
        assert_eq!(timing.missing_streak(), 151);
        timing.pose_present();
        assert_eq!(timing.missing_streak(), 0);
    }
}
