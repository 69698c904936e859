//! Batch and run timings
//!
//! Every search run records one measurement per batch plus one for the
//! whole run, keyed by the run id, so callers can summarise a single run.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Operation name recorded for every processed batch
pub const BATCH_OPERATION: &str = "search_batch";

/// Operation name recorded for every complete run
pub const RUN_OPERATION: &str = "search_run";

/// Oldest measurements are dropped past this many
const MAX_MEASUREMENTS: usize = 10_000;

#[derive(Debug, Clone)]
struct Measurement {
    operation: &'static str,
    run_id: Uuid,
    duration_ms: f64,
}

/// Timing summary for one operation of one run
#[derive(Debug, Clone, PartialEq)]
pub struct TimingStats {
    pub count: usize,
    pub total_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

/// Thread-safe store of timings shared by engines
#[derive(Default)]
pub struct MetricsCollector {
    measurements: Mutex<Vec<Measurement>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &'static str, run_id: Uuid, duration: Duration) {
        if let Ok(mut measurements) = self.measurements.lock() {
            if measurements.len() >= MAX_MEASUREMENTS {
                measurements.drain(0..MAX_MEASUREMENTS / 2);
            }
            measurements.push(Measurement {
                operation,
                run_id,
                duration_ms: duration.as_secs_f64() * 1000.0,
            });
        }
    }

    /// Summarise `operation` timings of run `run_id`; `None` when nothing
    /// was recorded.
    pub fn run_stats(&self, operation: &str, run_id: Uuid) -> Option<TimingStats> {
        let mut durations: Vec<f64> = match self.measurements.lock() {
            Ok(measurements) => measurements
                .iter()
                .filter(|m| m.operation == operation && m.run_id == run_id)
                .map(|m| m.duration_ms)
                .collect(),
            Err(_) => return None,
        };
        if durations.is_empty() {
            return None;
        }
        durations.sort_by(|a, b| a.total_cmp(b));

        let count = durations.len();
        let total: f64 = durations.iter().sum();
        let p95_index = ((count as f64) * 0.95) as usize;

        Some(TimingStats {
            count,
            total_ms: total,
            mean_ms: total / count as f64,
            max_ms: durations[count - 1],
            p95_ms: durations[p95_index.min(count - 1)],
        })
    }
}

/// Measures one batch or run and records it on `stop`.
pub struct Timer {
    start: Instant,
    operation: &'static str,
    run_id: Uuid,
    collector: Option<Arc<MetricsCollector>>,
}

impl Timer {
    /// Start a timer that only logs on completion
    pub fn start(operation: &'static str, run_id: Uuid) -> Self {
        Self {
            start: Instant::now(),
            operation,
            run_id,
            collector: None,
        }
    }

    /// Start a timer that also records into `collector`
    pub fn start_with_collector(operation: &'static str, run_id: Uuid, collector: Arc<MetricsCollector>) -> Self {
        Self {
            collector: Some(collector),
            ..Self::start(operation, run_id)
        }
    }

    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        if let Some(collector) = &self.collector {
            collector.record(self.operation, self.run_id, duration);
        }
        tracing::trace!(
            operation = self.operation,
            run_id = %self.run_id,
            duration_ms = duration.as_millis(),
            "Timer completed"
        );
        duration
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_METRICS: Arc<MetricsCollector> = Arc::new(MetricsCollector::new());
}

/// Get the process-wide metrics collector
pub fn global_metrics() -> Arc<MetricsCollector> {
    Arc::clone(&GLOBAL_METRICS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_run_stats_are_scoped_to_one_run() {
        let collector = MetricsCollector::new();
        let run = Uuid::new_v4();
        let other = Uuid::new_v4();

        collector.record(BATCH_OPERATION, run, Duration::from_millis(100));
        collector.record(BATCH_OPERATION, run, Duration::from_millis(150));
        collector.record(BATCH_OPERATION, run, Duration::from_millis(200));
        collector.record(BATCH_OPERATION, other, Duration::from_millis(900));

        let stats = collector.run_stats(BATCH_OPERATION, run).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean_ms - 150.0).abs() < 1.0);
        assert!((stats.total_ms - 450.0).abs() < 1.0);
        assert!((stats.max_ms - 200.0).abs() < 1.0);
        assert!(collector.run_stats(RUN_OPERATION, run).is_none());
    }

    #[test]
    fn test_timer_records_into_collector() {
        let collector = Arc::new(MetricsCollector::new());
        let run = Uuid::new_v4();

        let timer = Timer::start_with_collector(RUN_OPERATION, run, Arc::clone(&collector));
        thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();

        assert!(duration >= Duration::from_millis(10));
        let stats = collector.run_stats(RUN_OPERATION, run).unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.max_ms >= 10.0);

        Timer::start(RUN_OPERATION, run).stop();
        assert_eq!(collector.run_stats(RUN_OPERATION, run).unwrap().count, 1);
    }

    #[test]
    fn test_collector_stays_bounded() {
        let collector = MetricsCollector::new();
        let run = Uuid::new_v4();
        for _ in 0..MAX_MEASUREMENTS + 10 {
            collector.record(BATCH_OPERATION, run, Duration::from_micros(1));
        }
        let count = collector.run_stats(BATCH_OPERATION, run).unwrap().count;
        assert!(count <= MAX_MEASUREMENTS);
    }
}
