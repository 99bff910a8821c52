//! Logger metrics for observability
//!
//! Counters are plain atomics updated with `Relaxed` ordering; a snapshot
//! reads each counter once and is consistent per field, not across fields.
//! When collection is disabled every `record_*` call returns after a single
//! boolean check.

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LEVEL_COUNT: usize = LogLevel::ALL.len();

/// Metrics collector for the logging engine
///
/// # Example
///
/// ```
/// use rotating_log_engine::core::{LogLevel, MetricsCollector};
///
/// let metrics = MetricsCollector::new(true);
/// metrics.record_entry(LogLevel::Info, "mcp");
/// metrics.record_overflow();
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.total_entries, 1);
/// assert_eq!(snapshot.overflow_count, 1);
/// ```
#[derive(Debug)]
pub struct MetricsCollector {
    enabled: bool,

    /// Entries accepted by the facade
    total_entries: AtomicU64,
    level_counts: [AtomicU64; LEVEL_COUNT],
    /// Registered once per component; logger views keep their own handle
    component_counts: RwLock<HashMap<String, Arc<AtomicU64>>>,

    /// Entries written by the consumer or the synchronous path
    entries_written: AtomicU64,
    /// Entries written synchronously because the queue was full
    overflow_count: AtomicU64,
    /// Entries discarded when the shutdown drain ran out of time
    dropped_count: AtomicU64,
    /// Entries offered after close
    rejected_count: AtomicU64,

    buffer_capacity: AtomicU64,
    buffer_occupancy: AtomicU64,
    buffer_high_water: AtomicU64,

    flush_count: AtomicU64,
    /// Unix millis of the last flush, 0 when none happened yet
    last_flush_millis: AtomicI64,

    rotation_count: AtomicU64,
    write_error_count: AtomicU64,

    files_compressed: AtomicU64,
    compression_bytes_saved: AtomicU64,
    compression_failures: AtomicU64,

    access_requests: AtomicU64,
    access_status_classes: [AtomicU64; 5],
    access_duration_micros: AtomicU64,

    window_start_millis: AtomicI64,
}

/// Access traffic observed through access-tagged entries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccessCounts {
    pub total: u64,
    pub status_1xx: u64,
    pub status_2xx: u64,
    pub status_3xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub avg_duration_ms: f64,
}

/// Read-only view of the counters at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub enabled: bool,
    pub total_entries: u64,
    pub level_counts: BTreeMap<LogLevel, u64>,
    pub component_counts: BTreeMap<String, u64>,
    pub entries_written: u64,
    pub overflow_count: u64,
    pub dropped_count: u64,
    pub rejected_count: u64,
    pub buffer_occupancy: u64,
    pub buffer_capacity: u64,
    pub buffer_high_water: u64,
    pub flush_count: u64,
    pub last_flush_time: Option<DateTime<Utc>>,
    pub rotation_count: u64,
    pub write_error_count: u64,
    pub files_compressed: u64,
    pub compression_bytes_saved: u64,
    pub compression_failures: u64,
    pub access: AccessCounts,
    pub window_start: DateTime<Utc>,
    pub entries_per_second: f64,
}

impl MetricsSnapshot {
    /// Entries fully accounted for: written, written through the overflow
    /// fallback, or dropped at shutdown
    pub fn accounted_entries(&self) -> u64 {
        self.entries_written + self.overflow_count + self.dropped_count
    }

    pub fn level_count(&self, level: LogLevel) -> u64 {
        self.level_counts.get(&level).copied().unwrap_or(0)
    }
}

impl MetricsCollector {
    /// Create a collector; `enabled = false` turns every recording call into a no-op
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            total_entries: AtomicU64::new(0),
            level_counts: Default::default(),
            component_counts: RwLock::new(HashMap::new()),
            entries_written: AtomicU64::new(0),
            overflow_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
            buffer_capacity: AtomicU64::new(0),
            buffer_occupancy: AtomicU64::new(0),
            buffer_high_water: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
            last_flush_millis: AtomicI64::new(0),
            rotation_count: AtomicU64::new(0),
            write_error_count: AtomicU64::new(0),
            files_compressed: AtomicU64::new(0),
            compression_bytes_saved: AtomicU64::new(0),
            compression_failures: AtomicU64::new(0),
            access_requests: AtomicU64::new(0),
            access_status_classes: Default::default(),
            access_duration_micros: AtomicU64::new(0),
            window_start_millis: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Counter for `component`, registered on first use
    ///
    /// Holding the handle lets [`record_entry_with`](Self::record_entry_with)
    /// count entries without touching the component map.
    pub fn component_counter(&self, component: &str) -> Arc<AtomicU64> {
        if !self.enabled {
            return Arc::new(AtomicU64::new(0));
        }
        if let Some(counter) = self.component_counts.read().get(component) {
            return Arc::clone(counter);
        }
        Arc::clone(
            self.component_counts
                .write()
                .entry(component.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    }

    /// Record an accepted entry
    pub fn record_entry(&self, level: LogLevel, component: &str) {
        if !self.enabled {
            return;
        }
        self.record_entry_with(level, &self.component_counter(component));
    }

    /// Record an accepted entry against a pre-registered component counter
    #[inline]
    pub fn record_entry_with(&self, level: LogLevel, component: &AtomicU64) {
        if !self.enabled {
            return;
        }
        self.total_entries.fetch_add(1, Ordering::Relaxed);
        self.level_counts[level.index()].fetch_add(1, Ordering::Relaxed);
        component.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self, count: u64) {
        if self.enabled {
            self.entries_written.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_overflow(&self) {
        if self.enabled {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_dropped(&self, count: u64) {
        if self.enabled {
            self.dropped_count.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_rejected(&self) {
        if self.enabled {
            self.rejected_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_buffer_capacity(&self, capacity: usize) {
        if self.enabled {
            self.buffer_capacity.store(capacity as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn set_buffer_occupancy(&self, occupancy: usize) {
        if self.enabled {
            let occupancy = occupancy as u64;
            self.buffer_occupancy.store(occupancy, Ordering::Relaxed);
            self.buffer_high_water.fetch_max(occupancy, Ordering::Relaxed);
        }
    }

    pub fn record_flush(&self) {
        if self.enabled {
            self.flush_count.fetch_add(1, Ordering::Relaxed);
            self.last_flush_millis
                .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_rotation(&self) {
        if self.enabled {
            self.rotation_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_write_error(&self) {
        if self.enabled {
            self.write_error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one archived file and the bytes it saved
    pub fn record_compression(&self, original_bytes: u64, compressed_bytes: u64) {
        if self.enabled {
            self.files_compressed.fetch_add(1, Ordering::Relaxed);
            self.compression_bytes_saved.fetch_add(
                original_bytes.saturating_sub(compressed_bytes),
                Ordering::Relaxed,
            );
        }
    }

    #[inline]
    pub fn record_compression_failure(&self) {
        if self.enabled {
            self.compression_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an access-tagged request with its HTTP-style status
    pub fn record_access(&self, status: u16, duration: Duration) {
        if !self.enabled {
            return;
        }
        self.access_requests.fetch_add(1, Ordering::Relaxed);
        if (100..600).contains(&status) {
            let class = usize::from(status / 100) - 1;
            self.access_status_classes[class].fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.access_duration_micros
            .fetch_add(micros, Ordering::Relaxed);
    }

    /// Current values of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let level_counts = LogLevel::ALL
            .iter()
            .map(|level| (*level, self.level_counts[level.index()].load(Ordering::Relaxed)))
            .collect();
        let component_counts = self
            .component_counts
            .read()
            .iter()
            .map(|(name, count)| (name.clone(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        let access_total = self.access_requests.load(Ordering::Relaxed);
        let classes: Vec<u64> = self
            .access_status_classes
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect();
        let avg_duration_ms = if access_total == 0 {
            0.0
        } else {
            self.access_duration_micros.load(Ordering::Relaxed) as f64 / access_total as f64 / 1000.0
        };

        let window_start_millis = self.window_start_millis.load(Ordering::Relaxed);
        let window_start = DateTime::from_timestamp_millis(window_start_millis).unwrap_or_else(Utc::now);
        let total_entries = self.total_entries.load(Ordering::Relaxed);
        let elapsed_secs = (Utc::now().timestamp_millis() - window_start_millis).max(1) as f64 / 1000.0;

        let last_flush = self.last_flush_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            enabled: self.enabled,
            total_entries,
            level_counts,
            component_counts,
            entries_written: self.entries_written.load(Ordering::Relaxed),
            overflow_count: self.overflow_count.load(Ordering::Relaxed),
            dropped_count: self.dropped_count.load(Ordering::Relaxed),
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
            buffer_occupancy: self.buffer_occupancy.load(Ordering::Relaxed),
            buffer_capacity: self.buffer_capacity.load(Ordering::Relaxed),
            buffer_high_water: self.buffer_high_water.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            last_flush_time: (last_flush > 0)
                .then(|| DateTime::from_timestamp_millis(last_flush))
                .flatten(),
            rotation_count: self.rotation_count.load(Ordering::Relaxed),
            write_error_count: self.write_error_count.load(Ordering::Relaxed),
            files_compressed: self.files_compressed.load(Ordering::Relaxed),
            compression_bytes_saved: self.compression_bytes_saved.load(Ordering::Relaxed),
            compression_failures: self.compression_failures.load(Ordering::Relaxed),
            access: AccessCounts {
                total: access_total,
                status_1xx: classes[0],
                status_2xx: classes[1],
                status_3xx: classes[2],
                status_4xx: classes[3],
                status_5xx: classes[4],
                avg_duration_ms,
            },
            window_start,
            entries_per_second: total_entries as f64 / elapsed_secs,
        }
    }

    /// Zero all counters and restart the collection window
    ///
    /// Buffer capacity is a construction-time constant and survives the reset.
    pub fn reset(&self) {
        self.total_entries.store(0, Ordering::Relaxed);
        for counter in &self.level_counts {
            counter.store(0, Ordering::Relaxed);
        }
        // handles held by logger views stay registered
        for counter in self.component_counts.read().values() {
            counter.store(0, Ordering::Relaxed);
        }
        self.entries_written.store(0, Ordering::Relaxed);
        self.overflow_count.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
        self.rejected_count.store(0, Ordering::Relaxed);
        self.buffer_occupancy.store(0, Ordering::Relaxed);
        self.buffer_high_water.store(0, Ordering::Relaxed);
        self.flush_count.store(0, Ordering::Relaxed);
        self.last_flush_millis.store(0, Ordering::Relaxed);
        self.rotation_count.store(0, Ordering::Relaxed);
        self.write_error_count.store(0, Ordering::Relaxed);
        self.files_compressed.store(0, Ordering::Relaxed);
        self.compression_bytes_saved.store(0, Ordering::Relaxed);
        self.compression_failures.store(0, Ordering::Relaxed);
        self.access_requests.store(0, Ordering::Relaxed);
        for counter in &self.access_status_classes {
            counter.store(0, Ordering::Relaxed);
        }
        self.access_duration_micros.store(0, Ordering::Relaxed);
        self.window_start_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let snapshot = MetricsCollector::new(true).snapshot();
        assert_eq!(snapshot.total_entries, 0);
        assert_eq!(snapshot.overflow_count, 0);
        assert_eq!(snapshot.flush_count, 0);
        assert!(snapshot.last_flush_time.is_none());
        assert_eq!(snapshot.level_counts.len(), LEVEL_COUNT);
    }

    #[test]
    fn test_entry_counts_by_level_and_component() {
        let metrics = MetricsCollector::new(true);
        metrics.record_entry(LogLevel::Info, "mcp");
        metrics.record_entry(LogLevel::Info, "rest");
        metrics.record_entry(LogLevel::Error, "mcp");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_entries, 3);
        assert_eq!(snapshot.level_count(LogLevel::Info), 2);
        assert_eq!(snapshot.level_count(LogLevel::Error), 1);
        assert_eq!(snapshot.component_counts["mcp"], 2);
        assert_eq!(snapshot.component_counts["rest"], 1);
    }

    #[test]
    fn test_component_handle_survives_reset() {
        let metrics = MetricsCollector::new(true);
        let bridge = metrics.component_counter("bridge");
        assert!(Arc::ptr_eq(&bridge, &metrics.component_counter("bridge")));

        metrics.record_entry_with(LogLevel::Info, &bridge);
        metrics.record_entry(LogLevel::Warn, "bridge");
        assert_eq!(metrics.snapshot().component_counts["bridge"], 2);

        metrics.reset();
        assert!(metrics.snapshot().component_counts.is_empty());

        metrics.record_entry_with(LogLevel::Info, &bridge);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_entries, 1);
        assert_eq!(snapshot.component_counts["bridge"], 1);
    }

    #[test]
    fn test_disabled_collector_records_nothing() {
        let metrics = MetricsCollector::new(false);
        metrics.record_entry(LogLevel::Warn, "mcp");
        metrics.record_overflow();
        metrics.record_flush();
        metrics.record_access(200, Duration::from_millis(3));

        let snapshot = metrics.snapshot();
        assert!(!snapshot.enabled);
        assert_eq!(snapshot.total_entries, 0);
        assert_eq!(snapshot.overflow_count, 0);
        assert_eq!(snapshot.flush_count, 0);
        assert_eq!(snapshot.access.total, 0);
        assert!(snapshot.component_counts.is_empty());
    }

    #[test]
    fn test_access_classes_and_latency() {
        let metrics = MetricsCollector::new(true);
        metrics.record_access(200, Duration::from_millis(10));
        metrics.record_access(204, Duration::from_millis(20));
        metrics.record_access(503, Duration::from_millis(30));
        metrics.record_access(999, Duration::ZERO);

        let access = metrics.snapshot().access;
        assert_eq!(access.total, 4);
        assert_eq!(access.status_2xx, 2);
        assert_eq!(access.status_5xx, 1);
        assert!((access.avg_duration_ms - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_buffer_gauges() {
        let metrics = MetricsCollector::new(true);
        metrics.set_buffer_capacity(16);
        metrics.set_buffer_occupancy(9);
        metrics.set_buffer_occupancy(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.buffer_capacity, 16);
        assert_eq!(snapshot.buffer_occupancy, 3);
        assert_eq!(snapshot.buffer_high_water, 9);
    }

    #[test]
    fn test_compression_bytes_saved() {
        let metrics = MetricsCollector::new(true);
        metrics.record_compression(10_000, 1_500);
        metrics.record_compression(100, 120);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_compressed, 2);
        assert_eq!(snapshot.compression_bytes_saved, 8_500);
    }

    #[test]
    fn test_reset_restarts_window() {
        let metrics = MetricsCollector::new(true);
        metrics.set_buffer_capacity(8);
        metrics.record_entry(LogLevel::Debug, "mcp");
        metrics.record_flush();
        metrics.record_rotation();
        let before = metrics.snapshot().window_start;

        std::thread::sleep(Duration::from_millis(5));
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_entries, 0);
        assert_eq!(snapshot.rotation_count, 0);
        assert!(snapshot.last_flush_time.is_none());
        assert!(snapshot.component_counts.is_empty());
        assert_eq!(snapshot.buffer_capacity, 8);
        assert!(snapshot.window_start > before);
    }

    #[test]
    fn test_accounted_entries() {
        let metrics = MetricsCollector::new(true);
        metrics.record_written(5);
        metrics.record_overflow();
        metrics.record_dropped(2);
        assert_eq!(metrics.snapshot().accounted_entries(), 8);
    }
}
