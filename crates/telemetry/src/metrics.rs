//! Process-wide counters for the consume/persist pipeline.
//!
//! These are diagnostics only. Nothing in the pipeline reads them to make
//! decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 10ms, 50ms, 100ms, 500ms, 1s, 5s, 10s, 30s
    buckets: [AtomicU64; 8],
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 8] = [10, 50, 100, 500, 1_000, 5_000, 10_000, 30_000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// (upper bound, count) pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the log consumer.
#[derive(Debug, Default)]
pub struct Metrics {
    // Broker side
    pub messages_consumed: Counter,
    pub consume_errors: Counter,
    pub header_decode_warnings: Counter,
    pub payload_decode_warnings: Counter,
    pub offset_commits: Counter,
    pub commit_errors: Counter,
    pub invalid_records_dropped: Counter,

    // Database side
    pub records_saved: Counter,
    pub save_errors: Counter,
    pub save_latency_ms: Histogram,

    // Worker loop
    pub cycles_completed: Counter,
    pub cycles_failed: Counter,
    pub cycle_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_consumed: self.messages_consumed.get(),
            consume_errors: self.consume_errors.get(),
            header_decode_warnings: self.header_decode_warnings.get(),
            payload_decode_warnings: self.payload_decode_warnings.get(),
            offset_commits: self.offset_commits.get(),
            commit_errors: self.commit_errors.get(),
            invalid_records_dropped: self.invalid_records_dropped.get(),
            records_saved: self.records_saved.get(),
            save_errors: self.save_errors.get(),
            save_latency_mean_ms: self.save_latency_ms.mean(),
            cycles_completed: self.cycles_completed.get(),
            cycles_failed: self.cycles_failed.get(),
            cycle_latency_mean_ms: self.cycle_latency_ms.mean(),
            cycle_latency_max_ms: self.cycle_latency_ms.max(),
            cycle_latency_buckets: self.cycle_latency_ms.buckets(),
        }
    }
}

/// A point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_consumed: u64,
    pub consume_errors: u64,
    pub header_decode_warnings: u64,
    pub payload_decode_warnings: u64,
    pub offset_commits: u64,
    pub commit_errors: u64,
    pub invalid_records_dropped: u64,
    pub records_saved: u64,
    pub save_errors: u64,
    pub save_latency_mean_ms: f64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub cycle_latency_mean_ms: f64,
    pub cycle_latency_max_ms: u64,
    /// (upper bound ms, count) pairs
    pub cycle_latency_buckets: Vec<(u64, u64)>,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
