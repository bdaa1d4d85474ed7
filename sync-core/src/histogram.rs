//! Lock-free latency histogram.
//!
//! Subscribers record the interval between expressing a request and the
//! response arriving. Buckets are powers of two in milliseconds, so the
//! histogram covers sub-millisecond turnarounds up to multi-second stalls
//! with a fixed footprint. All operations are atomic; a histogram can be
//! shared across tasks behind an `Arc` without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of buckets; the last bucket absorbs everything above the range.
const BUCKETS: usize = 16;

/// Atomic histogram of millisecond latencies.
#[derive(Default)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; BUCKETS],
    count: AtomicU64,
    sum_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyHistogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one latency sample.
    pub fn record(&self, latency: Duration) {
        let ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
        self.buckets[Self::bucket_index(ms)].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut buckets = [0u64; BUCKETS];
        for (slot, bucket) in buckets.iter_mut().zip(&self.buckets) {
            *slot = bucket.load(Ordering::Relaxed);
        }
        HistogramSnapshot {
            buckets,
            count: self.count.load(Ordering::Relaxed),
            sum_ms: self.sum_ms.load(Ordering::Relaxed),
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }

    /// Bucket `i` (for `i >= 1`) holds samples in `[2^(i-1), 2^i)` ms;
    /// bucket 0 holds sub-millisecond samples.
    fn bucket_index(ms: u64) -> usize {
        if ms == 0 {
            0
        } else {
            let index = 64 - ms.leading_zeros() as usize;
            index.min(BUCKETS - 1)
        }
    }
}

impl std::fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("LatencyHistogram")
            .field("count", &snapshot.count)
            .field("mean_ms", &snapshot.mean_ms())
            .field("max_ms", &snapshot.max_ms)
            .finish()
    }
}

/// A point-in-time copy of a [`LatencyHistogram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramSnapshot {
    /// Per-bucket sample counts.
    pub buckets: [u64; BUCKETS],
    /// Total samples recorded.
    pub count: u64,
    /// Sum of all samples in milliseconds.
    pub sum_ms: u64,
    /// Largest sample in milliseconds.
    pub max_ms: u64,
}

impl HistogramSnapshot {
    /// Arithmetic mean in milliseconds, or 0.0 with no samples.
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ms as f64 / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn empty_histogram_snapshot() {
        let histogram = LatencyHistogram::new();
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.max_ms, 0);
        assert_eq!(snapshot.mean_ms(), 0.0);
    }

    #[test]
    fn records_count_sum_and_max() {
        let histogram = LatencyHistogram::new();
        histogram.record(ms(10));
        histogram.record(ms(30));
        histogram.record(ms(20));

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.sum_ms, 60);
        assert_eq!(snapshot.max_ms, 30);
        assert_eq!(snapshot.mean_ms(), 20.0);
    }

    #[test]
    fn bucket_boundaries_are_powers_of_two() {
        assert_eq!(LatencyHistogram::bucket_index(0), 0);
        assert_eq!(LatencyHistogram::bucket_index(1), 1);
        assert_eq!(LatencyHistogram::bucket_index(2), 2);
        assert_eq!(LatencyHistogram::bucket_index(3), 2);
        assert_eq!(LatencyHistogram::bucket_index(4), 3);
        assert_eq!(LatencyHistogram::bucket_index(1023), 10);
        assert_eq!(LatencyHistogram::bucket_index(1024), 11);
    }

    #[test]
    fn oversized_samples_land_in_last_bucket() {
        let histogram = LatencyHistogram::new();
        histogram.record(Duration::from_secs(3600));
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.buckets[BUCKETS - 1], 1);
    }

    #[test]
    fn samples_fall_into_expected_buckets() {
        let histogram = LatencyHistogram::new();
        histogram.record(ms(0)); // bucket 0
        histogram.record(ms(1)); // bucket 1
        histogram.record(ms(5)); // bucket 3: [4, 8)
        histogram.record(ms(7)); // bucket 3

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.buckets[0], 1);
        assert_eq!(snapshot.buckets[1], 1);
        assert_eq!(snapshot.buckets[3], 2);
    }
}
