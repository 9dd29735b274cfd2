//! Thread-safe metrics collection system
//!
//! Provides atomic counters and mutex-protected collections for tracking
//! pipeline runs, emitted events and tool invocations across all
//! connections.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Samples kept for duration percentiles
const MAX_DURATION_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // Run lifecycle counters
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_rejected: AtomicU64,
    runs_failed: AtomicU64,
    runs_cancelled: AtomicU64,
    runs_active: AtomicU64,
    max_concurrent_runs: AtomicU64,

    // Transport counters
    events_emitted: AtomicU64,
    streams_opened: AtomicU64,

    // Wall time of finished runs, in milliseconds
    run_durations: Mutex<Vec<u64>>,

    tool_stats: Mutex<HashMap<String, ToolInvocationStats>>,

    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_rejected: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            runs_cancelled: AtomicU64::new(0),
            runs_active: AtomicU64::new(0),
            max_concurrent_runs: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            streams_opened: AtomicU64::new(0),
            run_durations: Mutex::new(Vec::new()),
            tool_stats: Mutex::new(HashMap::new()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // Run lifecycle metrics
    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        let active = self.runs_active.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_concurrent_runs.fetch_max(active, Ordering::Relaxed);
    }

    pub fn run_completed(&self, duration: Duration) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.run_finished(duration);
    }

    pub fn run_rejected(&self, duration: Duration) {
        self.runs_rejected.fetch_add(1, Ordering::Relaxed);
        self.run_finished(duration);
    }

    pub fn run_failed(&self, duration: Duration) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.run_finished(duration);
    }

    pub fn run_cancelled(&self, duration: Duration) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
        self.run_finished(duration);
    }

    fn run_finished(&self, duration: Duration) {
        let _ = self
            .runs_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |active| {
                Some(active.saturating_sub(1))
            });
        Self::push_sample(&self.run_durations, duration);
    }

    pub fn active_runs(&self) -> u64 {
        self.runs_active.load(Ordering::Relaxed)
    }

    // Transport metrics
    pub fn event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Keep a bounded window of samples (pure function over the window)
    fn push_sample(samples: &Mutex<Vec<u64>>, duration: Duration) {
        if let Ok(mut samples) = samples.lock() {
            samples.push(duration.as_millis() as u64);
            if samples.len() > MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
        }
    }

    // Tool invocation metrics
    pub fn tool_invoked(&self, tool_name: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.tool_stats.lock() {
            let tool_stats = stats
                .entry(tool_name.to_string())
                .or_insert_with(|| ToolInvocationStats::new(tool_name));
            tool_stats.record(duration, success);
        }
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_completed,
            &self.runs_rejected,
            &self.runs_failed,
            &self.runs_cancelled,
            &self.runs_active,
            &self.max_concurrent_runs,
            &self.events_emitted,
            &self.streams_opened,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut durations) = self.run_durations.lock() {
            durations.clear();
        }
        if let Ok(mut stats) = self.tool_stats.lock() {
            stats.clear();
        }
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Calculate run duration statistics
    fn calculate_duration_statistics(&self) -> (f64, f64, f64, f64) {
        let Ok(durations) = self.run_durations.lock() else {
            return (0.0, 0.0, 0.0, 0.0);
        };
        if durations.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let mut sorted = durations.clone();
        sorted.sort_unstable();

        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (
            avg,
            percentile(&sorted, 50.0),
            percentile(&sorted, 95.0),
            percentile(&sorted, 99.0),
        )
    }

    fn build_tool_metrics(&self) -> ToolMetrics {
        let Ok(stats) = self.tool_stats.lock() else {
            return ToolMetrics::default();
        };

        let mut metrics = ToolMetrics::default();
        for (name, stats) in stats.iter() {
            metrics.total_invocations += stats.invocations;
            metrics.total_failures += stats.failures;
            metrics.tool_stats.insert(name.clone(), stats.snapshot());
        }
        metrics
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_duration_ms, p50, p95, p99) = self.calculate_duration_statistics();

        MetricsSnapshot {
            runs: RunMetrics {
                started: self.runs_started.load(Ordering::Relaxed),
                completed: self.runs_completed.load(Ordering::Relaxed),
                rejected: self.runs_rejected.load(Ordering::Relaxed),
                failed: self.runs_failed.load(Ordering::Relaxed),
                cancelled: self.runs_cancelled.load(Ordering::Relaxed),
                active: self.runs_active.load(Ordering::Relaxed),
                max_concurrent: self.max_concurrent_runs.load(Ordering::Relaxed),
                avg_duration_ms,
                duration_p50_ms: p50,
                duration_p95_ms: p95,
                duration_p99_ms: p99,
            },
            transport: TransportMetrics {
                streams_opened: self.streams_opened.load(Ordering::Relaxed),
                events_emitted: self.events_emitted.load(Ordering::Relaxed),
            },
            tools: self.build_tool_metrics(),
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Internal tool statistics (with timing data)
#[derive(Debug)]
struct ToolInvocationStats {
    name: String,
    invocations: u64,
    failures: u64,
    invocation_times: Vec<u64>,
    last_invocation: u64,
}

impl ToolInvocationStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invocations: 0,
            failures: 0,
            invocation_times: Vec::new(),
            last_invocation: 0,
        }
    }

    fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        self.last_invocation = current_timestamp();
        self.invocation_times.push(duration.as_millis() as u64);
        if self.invocation_times.len() > MAX_DURATION_SAMPLES {
            self.invocation_times.remove(0);
        }
        if !success {
            self.failures += 1;
        }
    }

    fn snapshot(&self) -> ToolInvocationStatsSnapshot {
        let avg_invocation_time_ms = if self.invocation_times.is_empty() {
            0.0
        } else {
            self.invocation_times.iter().sum::<u64>() as f64 / self.invocation_times.len() as f64
        };
        let success_rate = if self.invocations == 0 {
            0.0
        } else {
            (self.invocations - self.failures) as f64 / self.invocations as f64
        };

        ToolInvocationStatsSnapshot {
            name: self.name.clone(),
            invocations: self.invocations,
            failures: self.failures,
            avg_invocation_time_ms,
            last_invocation: self.last_invocation,
            success_rate,
        }
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub runs: RunMetrics,
    pub transport: TransportMetrics,
    pub tools: ToolMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct RunMetrics {
    pub started: u64,
    pub completed: u64,
    pub rejected: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub active: u64,
    pub max_concurrent: u64,
    pub avg_duration_ms: f64,
    pub duration_p50_ms: f64,
    pub duration_p95_ms: f64,
    pub duration_p99_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct TransportMetrics {
    pub streams_opened: u64,
    pub events_emitted: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct ToolMetrics {
    pub tool_stats: HashMap<String, ToolInvocationStatsSnapshot>,
    pub total_invocations: u64,
    pub total_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct ToolInvocationStatsSnapshot {
    pub name: String,
    pub invocations: u64,
    pub failures: u64,
    pub avg_invocation_time_ms: f64,
    pub last_invocation: u64,
    pub success_rate: f64,
}

// Helper functions
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_value = sorted_data[index.floor() as usize] as f64;
        let upper_value = sorted_data[index.ceil() as usize] as f64;
        lower_value + (upper_value - lower_value) * index.fract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_run_lifecycle_counters() {
        let collector = MetricsCollector::new();

        collector.run_started();
        collector.run_started();
        collector.run_started();
        collector.run_started();
        assert_eq!(collector.active_runs(), 4);

        collector.run_completed(Duration::from_millis(100));
        collector.run_rejected(Duration::from_millis(50));
        collector.run_failed(Duration::from_millis(10));
        collector.run_cancelled(Duration::from_millis(5));

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.runs.started, 4);
        assert_eq!(snapshot.runs.completed, 1);
        assert_eq!(snapshot.runs.rejected, 1);
        assert_eq!(snapshot.runs.failed, 1);
        assert_eq!(snapshot.runs.cancelled, 1);
        assert_eq!(snapshot.runs.active, 0);
        assert_eq!(snapshot.runs.max_concurrent, 4);
        assert_eq!(snapshot.runs.avg_duration_ms, 41.25);
    }

    #[test]
    fn test_active_runs_never_underflow() {
        let collector = MetricsCollector::new();
        collector.run_cancelled(Duration::ZERO);
        assert_eq!(collector.active_runs(), 0);
    }

    #[test]
    fn test_tool_metrics() {
        let collector = MetricsCollector::new();

        collector.tool_invoked("calculator", Duration::from_millis(2), true);
        collector.tool_invoked("calculator", Duration::from_millis(4), false);
        collector.tool_invoked("summary_lookup", Duration::from_millis(300), false);

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.tools.total_invocations, 3);
        assert_eq!(snapshot.tools.total_failures, 2);

        let calculator = &snapshot.tools.tool_stats["calculator"];
        assert_eq!(calculator.invocations, 2);
        assert_eq!(calculator.failures, 1);
        assert_eq!(calculator.avg_invocation_time_ms, 3.0);
        assert_eq!(calculator.success_rate, 0.5);
    }

    #[test]
    fn test_transport_counters() {
        let collector = MetricsCollector::new();
        collector.stream_opened();
        for _ in 0..7 {
            collector.event_emitted();
        }

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.transport.streams_opened, 1);
        assert_eq!(snapshot.transport.events_emitted, 7);
    }

    #[test]
    fn test_thread_safety() {
        let collector = Arc::new(MetricsCollector::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let collector = collector.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    collector.run_started();
                    collector.event_emitted();
                    collector.run_completed(Duration::from_millis(1));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.runs.started, 1000);
        assert_eq!(snapshot.runs.completed, 1000);
        assert_eq!(snapshot.runs.active, 0);
        assert_eq!(snapshot.transport.events_emitted, 1000);
    }

    #[test]
    fn test_percentile_calculation() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 50.0), 5.5);
        assert_eq!(percentile(&data, 100.0), 10.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_duration_window_is_bounded() {
        let collector = MetricsCollector::new();
        for _ in 0..(MAX_DURATION_SAMPLES + 50) {
            collector.run_started();
            collector.run_completed(Duration::from_millis(1));
        }
        assert_eq!(
            collector.run_durations.lock().unwrap().len(),
            MAX_DURATION_SAMPLES
        );
    }

    #[test]
    fn test_reset_functionality() {
        let collector = MetricsCollector::new();
        collector.run_started();
        collector.tool_invoked("calculator", Duration::from_millis(1), true);

        collector.reset();

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.runs.started, 0);
        assert_eq!(snapshot.runs.active, 0);
        assert!(snapshot.tools.tool_stats.is_empty());
    }
}
