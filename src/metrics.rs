//! Metrics module - per-task timing histograms

use hdrhistogram::Histogram;
use std::time::Duration;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scheduler::TaskStats;

fn histogram() -> Histogram<u64> {
    // Only fails for more than 5 significant figures
    Histogram::new(3).expect("3 significant figures is a valid precision")
}

// ============================================================================
// TIMING METRICS - Thread-safe performance tracking
// ============================================================================

#[derive(Clone)]
pub struct TimingMetrics {
    processing_hist: Arc<Mutex<Histogram<u64>>>,
    // Jitter tracking (variance in start-to-start interval)
    last_interval_ns: Arc<AtomicU64>,
    jitter_hist: Arc<Mutex<Histogram<u64>>>,
    // Lock contention tracking
    lock_wait_hist: Arc<Mutex<Histogram<u64>>>,
    lock_contentions: Arc<AtomicU64>,
}

impl TimingMetrics {
    pub fn new() -> Self {
        Self {
            processing_hist: Arc::new(Mutex::new(histogram())),
            last_interval_ns: Arc::new(AtomicU64::new(0)),
            jitter_hist: Arc::new(Mutex::new(histogram())),
            lock_wait_hist: Arc::new(Mutex::new(histogram())),
            lock_contentions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Time spent in one cycle body.
    pub fn record_processing(&self, duration: Duration) {
        self.processing_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Record jitter (variation between consecutive start-to-start intervals)
    pub fn record_cycle_jitter(&self, interval_ns: u64) {
        let last = self.last_interval_ns.swap(interval_ns, Ordering::Relaxed);
        if last > 0 {
            self.jitter_hist.lock().record(interval_ns.abs_diff(last)).ok();
        }
    }

    /// Time spent waiting on the shared store; `acquired == false` counts
    /// as a contention.
    pub fn record_lock_wait(&self, duration: Duration, acquired: bool) {
        self.lock_wait_hist.lock().record(duration.as_nanos() as u64).ok();
        if !acquired {
            self.lock_contentions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn report(&self) -> MetricsReport {
        let proc = self.processing_hist.lock();
        let jitter = self.jitter_hist.lock();
        let lock_wait = self.lock_wait_hist.lock();

        MetricsReport {
            samples: proc.len(),
            processing_p50: Duration::from_nanos(proc.value_at_quantile(0.5)),
            processing_p99: Duration::from_nanos(proc.value_at_quantile(0.99)),
            processing_max: Duration::from_nanos(proc.max()),
            jitter_p50: Duration::from_nanos(jitter.value_at_quantile(0.5)),
            jitter_p99: Duration::from_nanos(jitter.value_at_quantile(0.99)),
            lock_wait_p50: Duration::from_nanos(lock_wait.value_at_quantile(0.5)),
            lock_wait_p99: Duration::from_nanos(lock_wait.value_at_quantile(0.99)),
            total_lock_contentions: self.lock_contentions.load(Ordering::Relaxed),
        }
    }
}

impl Default for TimingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// METRICS REPORT - Summary statistics
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MetricsReport {
    pub samples: u64,
    pub processing_p50: Duration,
    pub processing_p99: Duration,
    pub processing_max: Duration,
    pub jitter_p50: Duration,
    pub jitter_p99: Duration,
    pub lock_wait_p50: Duration,
    pub lock_wait_p99: Duration,
    pub total_lock_contentions: u64,
}

/// Metrics and counters of one task, bundled for reporting.
#[derive(Clone)]
pub struct TaskMonitor {
    pub name: &'static str,
    pub metrics: TimingMetrics,
    pub stats: Arc<TaskStats>,
}

impl TaskMonitor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            metrics: TimingMetrics::new(),
            stats: TaskStats::new(),
        }
    }

    pub fn print_summary(&self) {
        let report = self.metrics.report();
        println!(
            "- {}: {} cycles, {} overruns, {} skipped, {} lock timeouts",
            self.name,
            self.stats.cycles(),
            self.stats.overruns(),
            self.stats.skipped(),
            self.stats.lock_timeouts()
        );
        println!(
            "    Processing P50: {:?}, P99: {:?}, max: {:?}",
            report.processing_p50, report.processing_p99, report.processing_max
        );
        println!("    Jitter P50: {:?}, P99: {:?}", report.jitter_p50, report.jitter_p99);
        println!(
            "    Lock wait P50: {:?}, P99: {:?} ({} contentions)",
            report.lock_wait_p50, report.lock_wait_p99, report.total_lock_contentions
        );
    }
}
