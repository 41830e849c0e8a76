use serde::Serialize;
use std::time::{Duration, Instant};

/// Counters for the frame interceptor.
pub struct InterceptorStats {
    processed: u64,
    passthrough: u64,
    degraded: u64,
    total_process_time: Duration,
    start_time: Instant,
}

/// Snapshot of interceptor stats for serialisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorSnapshot {
    pub fps: f64,
    pub frames_seen: u64,
    pub frames_processed: u64,
    pub frames_passthrough: u64,
    pub frames_degraded: u64,
    pub degraded_rate: f64,
    pub mean_process_ms: f64,
}

impl InterceptorStats {
    pub fn new() -> Self {
        Self {
            processed: 0,
            passthrough: 0,
            degraded: 0,
            total_process_time: Duration::ZERO,
            start_time: Instant::now(),
        }
    }

    /// Record a frame the pipeline processed, and how long it took.
    pub fn record_processed(&mut self, elapsed: Duration) {
        self.processed += 1;
        self.total_process_time += elapsed;
    }

    /// Record a frame returned untouched because no effect was active.
    pub fn record_passthrough(&mut self) {
        self.passthrough += 1;
    }

    /// Record a frame returned untouched because processing failed or was
    /// skipped under contention.
    pub fn record_degraded(&mut self) {
        self.degraded += 1;
    }

    pub fn frames_seen(&self) -> u64 {
        self.processed + self.passthrough + self.degraded
    }

    /// Frames seen per second since the last reset.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frames_seen() as f64 / elapsed
    }

    /// Degraded frames as a percentage of all frames (0.0 - 100.0).
    pub fn degraded_rate(&self) -> f64 {
        let total = self.frames_seen();
        if total == 0 {
            return 0.0;
        }
        (self.degraded as f64 / total as f64) * 100.0
    }

    /// Mean pipeline time per processed frame in milliseconds.
    pub fn mean_process_ms(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.total_process_time.as_secs_f64() * 1000.0 / self.processed as f64
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn snapshot(&self) -> InterceptorSnapshot {
        InterceptorSnapshot {
            fps: self.fps(),
            frames_seen: self.frames_seen(),
            frames_processed: self.processed,
            frames_passthrough: self.passthrough,
            frames_degraded: self.degraded,
            degraded_rate: self.degraded_rate(),
            mean_process_ms: self.mean_process_ms(),
        }
    }
}

impl Default for InterceptorStats {
    fn default() -> Self {
        Self::new()
    }
}
