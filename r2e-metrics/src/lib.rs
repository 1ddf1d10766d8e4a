//! C5 metrics provider (spec.md §4.5): counters, gauges, fixed-bucket
//! histograms, ring-buffer timers, and the background system-metrics
//! collector.

mod glob;
mod histogram;
mod key;
mod system;
mod timer;

pub use histogram::{HistogramSnapshot, BUCKETS};
pub use key::canonical_key;
pub use system::{spawn_collector, SystemSample};
pub use timer::{TimerHandle, TimerStats};

use dashmap::DashMap;
use histogram::Histogram;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use timer::Timer;

/// A single stored metric record, tagged by its kind (spec.md §3 Metric
/// Record).
#[derive(Debug, Clone)]
pub enum MetricSnapshot {
    Counter(u64),
    Gauge(f64),
    Histogram(HistogramSnapshot),
    Timer(TimerStats),
}

enum Slot {
    Counter(AtomicU64),
    /// Stored as bits of an `f64` so the gauge can be updated atomically
    /// without a lock (spec.md §5 "counters and gauges use atomic updates").
    Gauge(AtomicI64),
    Histogram(Mutex<Histogram>),
    Timer(Mutex<Timer>),
}

/// In-memory implementation of the metrics provider interface (spec.md
/// §4.5). Cheap to clone; all state lives behind `Arc`.
#[derive(Clone, Default)]
pub struct InMemoryMetrics {
    slots: Arc<DashMap<String, Slot>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str, value: u64, tags: &[(&str, &str)]) {
        let key = canonical_key(name, tags);
        match self.slots.entry(key).or_insert_with(|| Slot::Counter(AtomicU64::new(0))).value() {
            Slot::Counter(c) => {
                c.fetch_add(value, Ordering::Relaxed);
            }
            _ => tracing::warn!(name, "increment() called on a non-counter metric"),
        }
    }

    pub fn decrement(&self, name: &str, value: u64, tags: &[(&str, &str)]) {
        let key = canonical_key(name, tags);
        match self.slots.entry(key).or_insert_with(|| Slot::Counter(AtomicU64::new(0))).value() {
            Slot::Counter(c) => {
                c.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                    Some(cur.saturating_sub(value))
                })
                .ok();
            }
            _ => tracing::warn!(name, "decrement() called on a non-counter metric"),
        }
    }

    pub fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        let key = canonical_key(name, tags);
        let bits = value.to_bits() as i64;
        match self.slots.entry(key).or_insert_with(|| Slot::Gauge(AtomicI64::new(0))).value() {
            Slot::Gauge(g) => g.store(bits, Ordering::Relaxed),
            _ => tracing::warn!(name, "gauge() called on a non-gauge metric"),
        }
    }

    pub fn histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        let key = canonical_key(name, tags);
        match self
            .slots
            .entry(key)
            .or_insert_with(|| Slot::Histogram(Mutex::new(Histogram::default())))
            .value()
        {
            Slot::Histogram(h) => h.lock().unwrap().observe(value),
            _ => tracing::warn!(name, "histogram() called on a non-histogram metric"),
        }
    }

    /// `timer(name, tags) -> handle(stop() -> duration)` (spec.md §4.5).
    /// The caller must feed the handle's `stop()` result back through
    /// `timing` to record it — this method just hands out the stopwatch.
    pub fn timer(&self) -> TimerHandle {
        TimerHandle::start()
    }

    pub fn timing(&self, name: &str, duration: std::time::Duration, tags: &[(&str, &str)]) {
        let key = canonical_key(name, tags);
        match self
            .slots
            .entry(key)
            .or_insert_with(|| Slot::Timer(Mutex::new(Timer::default())))
            .value()
        {
            Slot::Timer(t) => t.lock().unwrap().record(duration),
            _ => tracing::warn!(name, "timing() called on a non-timer metric"),
        }
    }

    fn snapshot_slot(slot: &Slot) -> MetricSnapshot {
        match slot {
            Slot::Counter(c) => MetricSnapshot::Counter(c.load(Ordering::Relaxed)),
            Slot::Gauge(g) => MetricSnapshot::Gauge(f64::from_bits(g.load(Ordering::Relaxed) as u64)),
            Slot::Histogram(h) => MetricSnapshot::Histogram(h.lock().unwrap().snapshot()),
            Slot::Timer(t) => MetricSnapshot::Timer(t.lock().unwrap().stats()),
        }
    }

    /// Every metric currently stored, keyed by canonical key.
    pub fn get_snapshot(&self) -> std::collections::HashMap<String, MetricSnapshot> {
        self.slots
            .iter()
            .map(|e| (e.key().clone(), Self::snapshot_slot(e.value())))
            .collect()
    }

    /// Exact-key lookup (no tags implied — pass the canonical key as built
    /// by `canonical_key`, or a bare name for an untagged metric).
    pub fn get_metric(&self, key: &str) -> Option<MetricSnapshot> {
        self.slots.get(key).map(|e| Self::snapshot_slot(e.value()))
    }

    pub fn get_metrics(&self, pattern: Option<&str>) -> std::collections::HashMap<String, MetricSnapshot> {
        self.slots
            .iter()
            .filter(|e| pattern.map_or(true, |p| glob::glob_match(p, e.key())))
            .map(|e| (e.key().clone(), Self::snapshot_slot(e.value())))
            .collect()
    }

    pub fn reset(&self) {
        self.slots.clear();
    }

    pub fn reset_metric(&self, key: &str) {
        self.slots.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_sums_across_increments() {
        let m = InMemoryMetrics::new();
        for v in [1u64, 2, 3, 4] {
            m.increment("requests", v, &[]);
        }
        match m.get_metric("requests").unwrap() {
            MetricSnapshot::Counter(v) => assert_eq!(v, 10),
            other => panic!("expected counter, got {other:?}"),
        }
    }

    #[test]
    fn gauge_is_last_write_wins() {
        let m = InMemoryMetrics::new();
        m.gauge("queue.depth", 3.0, &[]);
        m.gauge("queue.depth", 7.0, &[]);
        match m.get_metric("queue.depth").unwrap() {
            MetricSnapshot::Gauge(v) => assert_eq!(v, 7.0),
            other => panic!("expected gauge, got {other:?}"),
        }
    }

    #[test]
    fn tags_produce_distinct_keys() {
        let m = InMemoryMetrics::new();
        m.increment("http.requests", 1, &[("method", "GET")]);
        m.increment("http.requests", 1, &[("method", "POST")]);
        assert_eq!(m.get_snapshot().len(), 2);
    }

    #[test]
    fn reset_metric_clears_just_that_key() {
        let m = InMemoryMetrics::new();
        m.increment("a", 1, &[]);
        m.increment("b", 1, &[]);
        m.reset_metric("a");
        assert!(m.get_metric("a").is_none());
        assert!(m.get_metric("b").is_some());
    }

    #[test]
    fn get_metrics_filters_by_glob() {
        let m = InMemoryMetrics::new();
        m.increment("http.requests", 1, &[]);
        m.increment("cache.hits", 1, &[]);
        assert_eq!(m.get_metrics(Some("http.*")).len(), 1);
        assert_eq!(m.get_metrics(None).len(), 2);
    }

    #[test]
    fn timing_feeds_the_histogram_ring() {
        let m = InMemoryMetrics::new();
        m.timing("op.duration", std::time::Duration::from_millis(5), &[]);
        m.timing("op.duration", std::time::Duration::from_millis(15), &[]);
        match m.get_metric("op.duration").unwrap() {
            MetricSnapshot::Timer(stats) => assert_eq!(stats.count, 2),
            other => panic!("expected timer, got {other:?}"),
        }
    }
}
