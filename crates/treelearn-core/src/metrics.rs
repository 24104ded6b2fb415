//! Generation metrics for a learning session.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Atomic counters for generation calls.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Generation calls started
    pub generations_started: AtomicU64,
    /// Generation calls that returned text
    pub generations_succeeded: AtomicU64,
    /// Generation calls that failed or timed out
    pub generations_failed: AtomicU64,
    /// Submissions rejected because another call was in flight
    pub busy_rejections: AtomicU64,
    /// Sum of settled call latencies in microseconds
    pub generation_latency_us: AtomicU64,
}

/// Point-in-time copy of [`SessionMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generations_started: u64,
    pub generations_succeeded: u64,
    pub generations_failed: u64,
    pub busy_rejections: u64,
    pub avg_latency_ms: f64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a generation call being issued.
    pub fn record_start(&self) {
        self.generations_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful call.
    pub fn record_success(&self, latency: Duration) {
        self.generations_succeeded.fetch_add(1, Ordering::Relaxed);
        self.add_latency(latency);
    }

    /// Record a failed call.
    pub fn record_failure(&self, latency: Duration) {
        self.generations_failed.fetch_add(1, Ordering::Relaxed);
        self.add_latency(latency);
    }

    /// Record a Busy rejection.
    pub fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    fn add_latency(&self, latency: Duration) {
        self.generation_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get average settled latency in milliseconds.
    pub fn avg_latency_ms(&self) -> f64 {
        let settled = self.generations_succeeded.load(Ordering::Relaxed)
            + self.generations_failed.load(Ordering::Relaxed);
        if settled == 0 {
            0.0
        } else {
            self.generation_latency_us.load(Ordering::Relaxed) as f64 / settled as f64 / 1000.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            generations_started: self.generations_started.load(Ordering::Relaxed),
            generations_succeeded: self.generations_succeeded.load(Ordering::Relaxed),
            generations_failed: self.generations_failed.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = SessionMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_calls() {
        let metrics = SessionMetrics::new();
        metrics.record_start();
        metrics.record_success(Duration::from_millis(10));
        metrics.record_start();
        metrics.record_failure(Duration::from_millis(30));
        metrics.record_busy();

        let snap = metrics.snapshot();
        assert_eq!(snap.generations_started, 2);
        assert_eq!(snap.generations_succeeded, 1);
        assert_eq!(snap.generations_failed, 1);
        assert_eq!(snap.busy_rejections, 1);
        assert!((snap.avg_latency_ms - 20.0).abs() < 0.001);
    }
}
