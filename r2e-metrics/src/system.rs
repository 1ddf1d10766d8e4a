//! Background system-metrics collector (spec.md §4.5: "samples process
//! RSS, heap, CPU time, uptime, and event-loop lag approximation every
//! `system_interval`").

use crate::InMemoryMetrics;
use std::time::{Duration, Instant};

/// One sample of process-level resource usage. `heap_bytes` and
/// `event_loop_lag_ms` are approximations — this is a systems-language
/// port of a runtime that tracks both natively; here they're derived from
/// the allocator-agnostic signals actually available (RSS as a heap proxy,
/// scheduler tick drift as a lag proxy).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSample {
    pub rss_bytes: u64,
    pub heap_bytes: u64,
    pub cpu_seconds: f64,
    pub uptime_seconds: f64,
    pub event_loop_lag_ms: f64,
}

/// Reads `/proc/self/status` and `/proc/self/stat` for RSS and CPU time.
/// Returns zeros on platforms without a `/proc` (the sampler still runs,
/// it just reports nothing useful — no panics on non-Linux dev machines).
fn read_proc_self() -> (u64, f64) {
    let rss_bytes = std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status.lines().find_map(|line| {
                line.strip_prefix("VmRSS:")
                    .and_then(|rest| rest.trim().split_whitespace().next())
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .map(|kb| kb * 1024)
            })
        })
        .unwrap_or(0);

    let cpu_seconds = std::fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|stat| {
            let fields: Vec<&str> = stat.rsplit(')').next()?.split_whitespace().collect();
            // utime is field 14, stime is field 15 counting from 1 after
            // the "(comm)" token; rsplit already dropped everything up to
            // and including the last ')'.
            let utime: u64 = fields.get(11)?.parse().ok()?;
            let stime: u64 = fields.get(12)?.parse().ok()?;
            let ticks_per_sec = 100u64; // USER_HZ, standard on Linux
            Some((utime + stime) as f64 / ticks_per_sec as f64)
        })
        .unwrap_or(0.0);

    (rss_bytes, cpu_seconds)
}

/// Sample once. `lag_probe` is the measured drift of a short `sleep` used
/// as the event-loop-lag approximation: schedule a 1ms sleep and see how
/// much longer it actually took.
pub async fn sample(started_at: Instant) -> SystemSample {
    let (rss_bytes, cpu_seconds) = read_proc_self();
    let lag_start = Instant::now();
    tokio::time::sleep(Duration::from_millis(1)).await;
    let lag = lag_start.elapsed().as_secs_f64() * 1000.0 - 1.0;

    SystemSample {
        rss_bytes,
        heap_bytes: rss_bytes,
        cpu_seconds,
        uptime_seconds: started_at.elapsed().as_secs_f64(),
        event_loop_lag_ms: lag.max(0.0),
    }
}

/// Spawn the periodic sampler, writing each sample into `metrics` as
/// gauges. Returns a handle the caller can abort on shutdown.
pub fn spawn_collector(
    metrics: InMemoryMetrics,
    system_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let started_at = Instant::now();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(system_interval);
        loop {
            interval.tick().await;
            let sample = sample(started_at).await;
            metrics.gauge("process.rss_bytes", sample.rss_bytes as f64, &[]);
            metrics.gauge("process.heap_bytes", sample.heap_bytes as f64, &[]);
            metrics.gauge("process.cpu_seconds", sample.cpu_seconds, &[]);
            metrics.gauge("process.uptime_seconds", sample.uptime_seconds, &[]);
            metrics.gauge("process.event_loop_lag_ms", sample.event_loop_lag_ms, &[]);
        }
    })
}
