//! Fixed-bucket histograms (spec.md §3/§4.5/§8).

/// The fixed bucket set named by spec.md §4.5. Not configurable — the spec
/// treats this set as part of the wire contract, not a tuning knob.
pub const BUCKETS: [f64; 12] = [
    0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
];

#[derive(Debug, Clone, Default)]
pub struct HistogramSnapshot {
    /// Cumulative count per bucket boundary, aligned with `BUCKETS`
    /// (§8 "bucket counts are non-decreasing in bucket value").
    pub bucket_counts: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

#[derive(Default)]
pub(crate) struct Histogram {
    bucket_counts: [u64; BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl Histogram {
    /// "For each observation, every bucket `b >= v` increments by 1."
    pub fn observe(&mut self, value: f64) {
        for (i, bound) in BUCKETS.iter().enumerate() {
            if *bound >= value {
                self.bucket_counts[i] += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bucket_counts: self.bucket_counts.to_vec(),
            sum: self.sum,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_monotonic() {
        let mut h = Histogram::default();
        for v in [0.2, 3.0, 40.0, 900.0] {
            h.observe(v);
        }
        let snap = h.snapshot();
        for w in snap.bucket_counts.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert_eq!(snap.count, 4);
    }

    #[test]
    fn value_increments_every_bucket_at_or_above_it() {
        let mut h = Histogram::default();
        h.observe(1.0);
        let snap = h.snapshot();
        // buckets are 0.1, 0.5, 1, 2.5, ... — first two are below 1.0
        assert_eq!(snap.bucket_counts[0], 0);
        assert_eq!(snap.bucket_counts[1], 0);
        assert_eq!(snap.bucket_counts[2], 1);
        assert_eq!(snap.bucket_counts[11], 1);
    }

    #[test]
    fn sum_and_count_track_totals() {
        let mut h = Histogram::default();
        h.observe(1.0);
        h.observe(2.0);
        let snap = h.snapshot();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.sum, 3.0);
    }
}
