use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use serde::Serialize;

/// Activity counters for a writer pool
#[derive(Debug)]
pub struct PoolMetrics {
    // Writer lifecycle
    /// Number of writers opened
    writers_opened: AtomicUsize,
    /// Number of writers closed, by sweep or failure
    writers_closed: AtomicUsize,
    /// Number of eviction sweeps run
    sweeps: AtomicUsize,

    // Record metrics
    /// Number of lines appended
    lines_written: AtomicUsize,
    /// Total bytes handed to writers, terminators included
    bytes_written: AtomicUsize,
    /// Records without a timestamp
    records_skipped: AtomicUsize,
    /// Records whose timestamp could not form a bucket
    records_rejected: AtomicUsize,

    // Failures
    /// Appends rejected by a destination
    write_failures: AtomicUsize,
    /// Destinations that could not be opened
    creation_failures: AtomicUsize,

    // Timing metrics
    /// Total append duration in nanoseconds
    write_duration_ns: AtomicU64,

    // Internal state
    /// Start time of the metrics collector
    start_time: Instant,
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            writers_opened: AtomicUsize::new(0),
            writers_closed: AtomicUsize::new(0),
            sweeps: AtomicUsize::new(0),

            lines_written: AtomicUsize::new(0),
            bytes_written: AtomicUsize::new(0),
            records_skipped: AtomicUsize::new(0),
            records_rejected: AtomicUsize::new(0),

            write_failures: AtomicUsize::new(0),
            creation_failures: AtomicUsize::new(0),

            write_duration_ns: AtomicU64::new(0),

            start_time: Instant::now(),
        }
    }

    pub fn increment_writers_opened(&self) {
        self.writers_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_writers_closed(&self, count: usize) {
        self.writers_closed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_sweeps(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one appended line of `bytes` bytes
    pub fn record_line(&self, bytes: usize, duration: Duration) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.write_duration_ns.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn increment_records_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_creation_failures(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get number of lines appended
    pub fn get_lines_written(&self) -> usize {
        self.lines_written.load(Ordering::Relaxed)
    }

    /// Get number of writers opened
    pub fn get_writers_opened(&self) -> usize {
        self.writers_opened.load(Ordering::Relaxed)
    }

    /// Get number of writers closed
    pub fn get_writers_closed(&self) -> usize {
        self.writers_closed.load(Ordering::Relaxed)
    }

    /// Get average append duration
    pub fn get_avg_write_duration(&self) -> Duration {
        let lines = self.get_lines_written();
        if lines == 0 {
            return Duration::from_secs(0);
        }
        Duration::from_nanos(self.write_duration_ns.load(Ordering::Relaxed) / lines as u64)
    }

    /// Get uptime of the collector
    pub fn get_uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            writers_opened: self.get_writers_opened(),
            writers_closed: self.get_writers_closed(),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            lines_written: self.get_lines_written(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            avg_write_duration_us: self.get_avg_write_duration().as_micros() as u64,
            uptime_secs: self.get_uptime().as_secs(),
        }
    }
}

/// Serializable copy of the pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub writers_opened: usize,
    pub writers_closed: usize,
    pub sweeps: usize,
    pub lines_written: usize,
    pub bytes_written: usize,
    pub records_skipped: usize,
    pub records_rejected: usize,
    pub write_failures: usize,
    pub creation_failures: usize,
    pub avg_write_duration_us: u64,
    pub uptime_secs: u64,
}

impl MetricsSnapshot {
    /// Writers opened but not yet closed, as far as the counters know
    pub fn open_writers(&self) -> usize {
        self.writers_opened.saturating_sub(self.writers_closed)
    }
}
