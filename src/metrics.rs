// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Counters and durations for instrumented operations.
//!
//! Every `instrument` / `instrument_async` run is recorded here by operation
//! name. Nothing is exported; the numbers are kept for inspection only.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Per-operation statistics collected by a `Diagnostics` instance.
#[derive(Debug)]
pub struct Metrics {
    operations: RwLock<BTreeMap<String, OperationMetrics>>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record one completed run of `name`.
    pub fn record(&self, name: &str, duration: Duration, success: bool) {
        let mut ops = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        ops.entry(name.to_string())
            .or_default()
            .record(duration, success);
    }

    /// Statistics for one operation, if it ever ran.
    pub fn operation(&self, name: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self
                .operations
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            uptime: self.uptime(),
        }
    }

    pub fn reset(&self) {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for one named operation.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    /// Number of runs.
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// Latency distribution.
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.count += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration = self.total_duration.saturating_add(duration);
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_duration.as_nanos() / u128::from(self.count);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }

    /// Fraction of successful runs, 1.0 when nothing ran yet.
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bucket bounds in microseconds; one extra overflow bucket follows.
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom upper bounds (microseconds, ascending).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let index = self
            .buckets
            .iter()
            .position(|&bound| micros <= bound)
            .unwrap_or(self.buckets.len());
        self.counts[index] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Upper bound of the bucket holding the `p`th percentile.
    ///
    /// The overflow bucket reports ten times the largest bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(&bound) => bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100us, 1ms, 10ms, 100ms, 1s, 10s
        Self::with_buckets(vec![100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}

/// Point-in-time copy of all operation statistics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations: BTreeMap<String, OperationMetrics>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Human-readable summary, one line per operation.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Instrumentation Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));

        if self.operations.is_empty() {
            report.push_str("No instrumented operations recorded.\n");
            return report;
        }

        report.push('\n');
        for (name, metrics) in &self.operations {
            report.push_str(&format!(
                "  {}: {} runs, {:.1}% success, avg {:.2?}, p99 {:.2?}\n",
                name,
                metrics.count,
                metrics.success_rate() * 100.0,
                metrics.avg_duration(),
                metrics.histogram.p99()
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_metrics() {
        let mut metrics = OperationMetrics::new();
        metrics.record(Duration::from_millis(10), true);
        metrics.record(Duration::from_millis(20), true);
        metrics.record(Duration::from_millis(30), false);

        assert_eq!(metrics.count, 3);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.avg_duration(), Duration::from_millis(20));
        assert_eq!(metrics.min_duration, Duration::from_millis(10));
        assert_eq!(metrics.max_duration, Duration::from_millis(30));
        assert!((metrics.success_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_histogram_buckets() {
        let mut hist = Histogram::default();
        hist.record(Duration::from_micros(50));
        hist.record(Duration::from_micros(500));
        hist.record(Duration::from_millis(5));
        hist.record(Duration::from_secs(60));

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[2], 1);
        assert_eq!(hist.counts()[6], 1);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..100 {
            hist.record(Duration::from_micros(500));
        }

        assert_eq!(hist.p50(), Duration::from_millis(1));
        assert_eq!(hist.p99(), Duration::from_millis(1));
        assert_eq!(Histogram::default().p50(), Duration::ZERO);
    }

    #[test]
    fn test_metrics_snapshot_and_reset() {
        let metrics = Metrics::new();
        metrics.record("load-user", Duration::from_millis(3), false);
        metrics.record("load-user", Duration::from_millis(5), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations["load-user"].count, 2);
        assert!(snapshot.format_report().contains("load-user: 2 runs, 50.0% success"));

        metrics.reset();
        assert!(metrics.operation("load-user").is_none());
    }

    #[test]
    fn test_avg_duration_with_large_count() {
        let mut m = OperationMetrics::new();
        m.count = 1 << 32;
        m.total_duration = Duration::from_secs(1 << 32);
        assert_eq!(m.avg_duration(), Duration::from_secs(1));

        m.count = (1 << 32) + 2;
        m.total_duration = Duration::from_secs(100);
        assert!(m.avg_duration() < Duration::from_millis(1));
    }
}
