use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use tokio::time::Instant;

/// Process-wide replay counters, shared by all workers.
///
/// Every emission attempt increments exactly one of the two counters.
#[derive(Debug)]
pub struct Metrics {
    start: Instant,
    total_lines: AtomicU64,
    dropped_lines: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            total_lines: AtomicU64::new(0),
            dropped_lines: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn record_sent(&self) {
        self.total_lines.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Live view of the counters, only meant for progress reporting
    /// while workers are still running.
    pub fn snapshot(&self) -> Report {
        Report {
            elapsed: self.start.elapsed(),
            total_lines: self.total_lines.load(Ordering::Relaxed),
            dropped_lines: self.dropped_lines.load(Ordering::Relaxed),
        }
    }

    /// Final report.
    ///
    /// Only to be computed once all workers have been joined,
    /// the join being what orders their increments before these loads.
    pub fn report(&self) -> Report {
        self.snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Report {
    #[serde(serialize_with = "serialize_duration_ms", rename = "elapsed_ms")]
    pub elapsed: Duration,
    pub total_lines: u64,
    pub dropped_lines: u64,
}

impl Report {
    /// All emission attempts, successful or not.
    pub fn attempts(&self) -> u64 {
        self.total_lines + self.dropped_lines
    }

    /// Successfully emitted records per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0. {
            0.
        } else {
            self.total_lines as f64 / secs
        }
    }
}

fn serialize_duration_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_math() {
        let report = Report {
            elapsed: Duration::from_secs(2),
            total_lines: 90,
            dropped_lines: 10,
        };
        assert_eq!(report.attempts(), 100);
        assert_eq!(report.throughput(), 45.);
    }

    #[test]
    fn test_report_zero_elapsed() {
        let report = Report {
            elapsed: Duration::ZERO,
            total_lines: 5,
            dropped_lines: 0,
        };
        assert_eq!(report.throughput(), 0.);
    }

    #[test]
    fn test_report_json() {
        let report = Report {
            elapsed: Duration::from_millis(1500),
            total_lines: 3,
            dropped_lines: 1,
        };
        let v = serde_json::to_value(report).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "elapsed_ms": 1500,
                "total_lines": 3,
                "dropped_lines": 1,
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        const TASKS: u64 = 8;
        const PER_TASK: u64 = 10_000;

        let metrics = Metrics::new();
        let mut handles = Vec::new();
        for task in 0..TASKS {
            let metrics = metrics.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..PER_TASK {
                    if (i + task) % 4 == 0 {
                        metrics.record_dropped();
                    } else {
                        metrics.record_sent();
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let report = metrics.report();
        assert_eq!(report.attempts(), TASKS * PER_TASK);
        assert_eq!(report.dropped_lines, TASKS * PER_TASK / 4);
    }
}
