//! Ring-buffer timers (spec.md §3/§4.5/§8): last 1000 observations, stats
//! computed on demand.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const RING_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, Default)]
pub struct TimerStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p95: f64,
}

#[derive(Default)]
pub(crate) struct Timer {
    samples: VecDeque<f64>,
}

impl Timer {
    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() == RING_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(duration.as_secs_f64() * 1000.0);
    }

    /// `p95 = sorted[floor(n * 0.95)]` for a sample of size `n <= 1000`
    /// (spec.md §8).
    pub fn stats(&self) -> TimerStats {
        if self.samples.is_empty() {
            return TimerStats::default();
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let p95_index = ((n as f64) * 0.95).floor() as usize;
        let p95 = sorted[p95_index.min(n - 1)];
        TimerStats {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            avg: sum / n as f64,
            p95,
        }
    }
}

/// A running timer handle returned by `MetricsProvider::timer` (spec.md
/// §4.5 `timer(name, tags?) -> handle(stop() -> duration)`).
pub struct TimerHandle {
    started_at: Instant,
}

impl TimerHandle {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn stop(self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p95_matches_sorted_index() {
        let mut t = Timer::default();
        for ms in 1..=100u64 {
            t.record(Duration::from_millis(ms));
        }
        let stats = t.stats();
        assert_eq!(stats.count, 100);
        // sorted[floor(100*0.95)] = sorted[95] = 96ms (1-indexed values 1..100)
        assert!((stats.p95 - 96.0).abs() < 1e-6);
    }

    #[test]
    fn ring_buffer_drops_oldest_beyond_capacity() {
        let mut t = Timer::default();
        for ms in 0..(RING_CAPACITY + 10) {
            t.record(Duration::from_millis(ms as u64));
        }
        assert_eq!(t.samples.len(), RING_CAPACITY);
        assert_eq!(*t.samples.front().unwrap(), 10.0);
    }

    #[test]
    fn timer_handle_reports_elapsed() {
        let handle = TimerHandle::start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(handle.stop() >= Duration::from_millis(5));
    }
}
