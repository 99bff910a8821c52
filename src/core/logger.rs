//! Main logger implementation

use super::{
    async_writer::{AsyncWriter, EntrySink, WriteOutcome},
    compression::{CompressionManager, CompressionPolicy},
    config::LogConfig,
    destination::Category,
    dispatcher::{Dispatcher, Router},
    error::{LoggerError, Result},
    fields::{FieldValue, Fields},
    log_entry::{LogEntry, SourceLocation},
    log_level::LogLevel,
    metrics::{MetricsCollector, MetricsSnapshot},
    output_format::OutputFormat,
    timestamp::TimestampFormat,
};
use crate::appenders::{
    console::ConsoleAppender,
    layout::FileLayout,
    rotating_file::RotationPolicy,
    rotation_manager::RotationManager,
};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default shutdown timeout used when the logger is dropped without `close()`
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lower bound for stopping the compressor once the drain used up the timeout
const MIN_COMPRESSION_STOP: Duration = Duration::from_millis(100);

/// One HTTP-style request, written to the access destination
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration: Duration,
    /// Extra fields such as a request id or client address
    pub fields: Fields,
}

impl AccessRecord {
    pub fn new(method: impl Into<String>, path: impl Into<String>, status: u16, duration: Duration) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status,
            duration,
            fields: Fields::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// Server errors are logged at Error, client errors at Warn
    pub fn level(&self) -> LogLevel {
        match self.status {
            500..=u16::MAX => LogLevel::Error,
            400..=499 => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }
}

struct LoggerCore {
    min_level: LogLevel,
    dispatcher: Arc<Dispatcher>,
    writer: Option<AsyncWriter>,
    compressor: Option<CompressionManager>,
    metrics: Arc<MetricsCollector>,
    shutdown_timeout: Duration,
    closed: AtomicBool,
    close_lock: Mutex<()>,
}

impl LoggerCore {
    fn dispatch(&self, entry: LogEntry, component: &AtomicU64) {
        let level = entry.level;
        match &self.writer {
            Some(writer) => {
                if writer.write(entry) != WriteOutcome::Rejected {
                    self.metrics.record_entry_with(level, component);
                }
            }
            None => {
                self.metrics.record_entry_with(level, component);
                let result = catch_unwind(AssertUnwindSafe(|| self.dispatcher.write_entry(&entry)));
                self.metrics.record_written(1);
                if result.is_err() {
                    self.metrics.record_write_error();
                    eprintln!("[LOGGER CRITICAL] Synchronous write panicked");
                }
            }
        }
    }

    fn flush(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        match &self.writer {
            Some(writer) => writer.flush(),
            None => self.dispatcher.flush(),
        }
    }

    fn close(&self, timeout: Duration) -> Result<()> {
        let _guard = self.close_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let start = Instant::now();

        if let Some(writer) = &self.writer {
            writer.close(timeout)?;
        }
        if let Some(compressor) = &self.compressor {
            let remaining = timeout.saturating_sub(start.elapsed()).max(MIN_COMPRESSION_STOP);
            compressor.stop(remaining);
        }

        let flushed = self.dispatcher.flush();
        let closed = self.dispatcher.close();
        flushed.and(closed)
    }
}

impl Drop for LoggerCore {
    fn drop(&mut self) {
        if let Err(e) = self.close(self.shutdown_timeout) {
            eprintln!("[LOGGER ERROR] Failed to close logger during drop: {}", e);
        }
        let dropped = self.metrics.snapshot().dropped_count;
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shut down with {} entries discarded at the drain deadline",
                dropped
            );
        }
    }
}

/// Handle to a logging engine
///
/// Cloning is cheap. Views created with [`with_fields`](Logger::with_fields)
/// and [`with_component`](Logger::with_component) share the same writers,
/// buffer and metrics. The engine shuts down on [`close`](Logger::close) or
/// when the last handle is dropped.
///
/// # Example
///
/// ```no_run
/// use rotating_log_engine::prelude::*;
///
/// let logger = Logger::builder()
///     .base_path("/var/log/mcp")
///     .level(LogLevel::Debug)
///     .build()?;
///
/// let request_log = logger.with_fields(fields! { "request_id" => "r-17" });
/// request_log.info("tool call started");
/// logger.close()?;
/// # Ok::<(), rotating_log_engine::LoggerError>(())
/// ```
#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
    bound: Arc<Fields>,
    component: Arc<str>,
    component_entries: Arc<AtomicU64>,
}

impl Logger {
    /// Validate the configuration and start the engine
    ///
    /// Nothing is created on disk when validation fails.
    pub fn new(config: LogConfig) -> Result<Self> {
        let (min_level, format) = config.validate()?;
        let metrics = Arc::new(MetricsCollector::new(config.metrics.enabled));
        let layout = FileLayout::new(&config.file.base_path);

        let mut dispatcher = Dispatcher::new(
            Router::new(&config.separation),
            format,
            config.timestamp_format.clone(),
            Arc::clone(&metrics),
        );
        if config.file.enabled {
            let policy = RotationPolicy::new()
                .with_max_size(config.rotation.max_size_bytes())
                .with_max_age(config.rotation.max_age())
                .with_max_backups(config.rotation.max_backups);
            dispatcher = dispatcher.with_files(RotationManager::new(
                layout.clone(),
                policy,
                !config.async_mode.enabled,
                Arc::clone(&metrics),
            ));
        }
        if config.console.enabled {
            dispatcher = dispatcher.with_console(ConsoleAppender::with_colors(config.console.colors));
        }
        let dispatcher = Arc::new(dispatcher);

        let writer = if config.async_mode.enabled {
            let sink: Arc<dyn EntrySink> = Arc::clone(&dispatcher) as Arc<dyn EntrySink>;
            let writer = AsyncWriter::new(sink, &config.async_mode, Arc::clone(&metrics));
            writer.start()?;
            Some(writer)
        } else {
            None
        };

        let compressor = if config.file.enabled && config.rotation.compress {
            let policy = CompressionPolicy {
                compress_after: config.rotation.compress_after(),
                interval: config.rotation.compress_interval,
            };
            Some(CompressionManager::start(layout, policy, Arc::clone(&metrics))?)
        } else {
            None
        };

        let shutdown_timeout = if config.async_mode.enabled {
            config.async_mode.shutdown_timeout
        } else {
            DEFAULT_SHUTDOWN_TIMEOUT
        };

        let component_entries = metrics.component_counter(&config.component);
        Ok(Self {
            core: Arc::new(LoggerCore {
                min_level,
                dispatcher,
                writer,
                compressor,
                metrics,
                shutdown_timeout,
                closed: AtomicBool::new(false),
                close_lock: Mutex::new(()),
            }),
            bound: Arc::new(Fields::new()),
            component: Arc::from(config.component.as_str()),
            component_entries,
        })
    }

    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn min_level(&self) -> LogLevel {
        self.core.min_level
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Fields bound to this view
    pub fn bound_fields(&self) -> &Fields {
        &self.bound
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.core.min_level
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    fn submit(
        &self,
        level: LogLevel,
        message: &str,
        fields: Fields,
        category: Category,
        location: Option<SourceLocation>,
    ) {
        if self.core.closed.load(Ordering::Acquire) {
            self.core.metrics.record_rejected();
            return;
        }

        let fields = if self.bound.is_empty() {
            fields
        } else {
            self.bound.merged(&fields)
        };
        let mut entry = LogEntry::new(level, message)
            .with_fields(fields)
            .with_component(&*self.component)
            .with_category(category);
        if let Some(location) = location {
            entry = entry.with_location(location);
        }
        self.core.dispatch(entry, &self.component_entries);
    }

    /// Emit one entry; never fails and never blocks beyond one synchronous write
    ///
    /// `fields` take precedence over fields bound to this view.
    pub fn emit(&self, level: LogLevel, message: impl AsRef<str>, fields: Fields) {
        if !self.is_enabled(level) {
            return;
        }
        self.submit(level, message.as_ref(), fields, Category::Application, None);
    }

    /// Emit with a source location; used by the logging macros
    pub fn emit_with_location(
        &self,
        level: LogLevel,
        message: impl AsRef<str>,
        fields: Fields,
        location: SourceLocation,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        self.submit(level, message.as_ref(), fields, Category::Application, Some(location));
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.emit(level, message, Fields::new());
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn fatal(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Fatal, message);
    }

    /// New view with `fields` merged into every later emission
    #[must_use]
    pub fn with_fields(&self, fields: Fields) -> Logger {
        Logger {
            core: Arc::clone(&self.core),
            bound: Arc::new(self.bound.merged(&fields)),
            component: Arc::clone(&self.component),
            component_entries: Arc::clone(&self.component_entries),
        }
    }

    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Logger {
        self.with_fields(Fields::new().with_field(key, value))
    }

    /// New view whose entries carry `component`
    #[must_use]
    pub fn with_component(&self, component: impl AsRef<str>) -> Logger {
        Logger {
            core: Arc::clone(&self.core),
            bound: Arc::clone(&self.bound),
            component: Arc::from(component.as_ref()),
            component_entries: self.core.metrics.component_counter(component.as_ref()),
        }
    }

    /// Record one request in the access destination
    ///
    /// Access entries are not subject to the minimum level.
    pub fn access(&self, record: AccessRecord) {
        if self.is_closed() {
            self.core.metrics.record_rejected();
            return;
        }
        self.core.metrics.record_access(record.status, record.duration);

        let message = format!("{} {} {}", record.method, record.path, record.status);
        let level = record.level();
        let mut fields = record.fields;
        fields.insert("method", record.method);
        fields.insert("path", record.path);
        fields.insert("status", record.status);
        fields.insert("duration_ms", record.duration.as_secs_f64() * 1000.0);
        self.submit(level, &message, fields, Category::Access, None);
    }

    /// Write a named measurement to the metrics destination
    pub fn metric(&self, name: impl AsRef<str>, fields: Fields) {
        self.submit(LogLevel::Info, name.as_ref(), fields, Category::Metrics, None);
    }

    /// Write the engine's own counters to the metrics destination
    pub fn log_metrics_snapshot(&self) {
        let fields = snapshot_fields(&self.core.metrics.snapshot());
        self.metric("logger_metrics", fields);
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.core.metrics.reset();
    }

    /// Write out everything accepted so far
    ///
    /// A no-op once the logger is closed.
    pub fn flush(&self) -> Result<()> {
        self.core.flush()
    }

    /// Rotate every destination file that has content
    pub fn rotate(&self) -> Result<Vec<PathBuf>> {
        if self.is_closed() {
            return Err(LoggerError::LoggerStopped);
        }
        self.flush()?;
        match self.core.dispatcher.files() {
            Some(files) => files.rotate_all(),
            None => Ok(Vec::new()),
        }
    }

    /// Drain the buffer, stop background work and close all files
    ///
    /// Idempotent. Entries still queued when the shutdown timeout elapses
    /// are discarded and counted in `dropped_count`; that is not an error.
    pub fn close(&self) -> Result<()> {
        self.core.close(self.core.shutdown_timeout)
    }

    pub fn close_with_timeout(&self, timeout: Duration) -> Result<()> {
        self.core.close(timeout)
    }
}

fn snapshot_fields(snapshot: &MetricsSnapshot) -> Fields {
    let levels: Fields = snapshot
        .level_counts
        .iter()
        .map(|(level, count)| (level.to_str().to_lowercase(), *count))
        .collect();
    let components: Fields = snapshot
        .component_counts
        .iter()
        .map(|(component, count)| (component.clone(), *count))
        .collect();

    Fields::new()
        .with_field("total_entries", snapshot.total_entries)
        .with_field("entries_written", snapshot.entries_written)
        .with_field("overflow_count", snapshot.overflow_count)
        .with_field("dropped_count", snapshot.dropped_count)
        .with_field("rejected_count", snapshot.rejected_count)
        .with_field("buffer_occupancy", snapshot.buffer_occupancy)
        .with_field("buffer_capacity", snapshot.buffer_capacity)
        .with_field("buffer_high_water", snapshot.buffer_high_water)
        .with_field("flush_count", snapshot.flush_count)
        .with_field("rotation_count", snapshot.rotation_count)
        .with_field("write_error_count", snapshot.write_error_count)
        .with_field("files_compressed", snapshot.files_compressed)
        .with_field("compression_bytes_saved", snapshot.compression_bytes_saved)
        .with_field("compression_failures", snapshot.compression_failures)
        .with_field("entries_per_second", snapshot.entries_per_second)
        .with_field("level_counts", levels)
        .with_field("component_counts", components)
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```no_run
/// use rotating_log_engine::prelude::*;
/// use std::time::Duration;
///
/// let logger = Logger::builder()
///     .base_path("logs")
///     .level(LogLevel::Debug)
///     .format(OutputFormat::Json)
///     .max_size_mb(50.0)
///     .max_backups(5)
///     .buffer_size(4096)
///     .flush_interval(Duration::from_millis(500))
///     .build()?;
/// # Ok::<(), LoggerError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggerBuilder {
    config: LogConfig,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: LogConfig) -> Self {
        Self { config }
    }

    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level.to_str().to_lowercase();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format.to_string();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.config.timestamp_format = format;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.config.component = component.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.file.base_path = path.into();
        self
    }

    /// Enable or disable file output
    #[must_use = "builder methods return a new value"]
    pub fn file_output(mut self, enabled: bool) -> Self {
        self.config.file.enabled = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_size_mb(mut self, size: f64) -> Self {
        self.config.rotation.max_size_mb = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_age_days(mut self, days: f64) -> Self {
        self.config.rotation.max_age_days = days;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_backups(mut self, count: usize) -> Self {
        self.config.rotation.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.rotation.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn compress_after_days(mut self, days: f64) -> Self {
        self.config.rotation.compress_after_days = days;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn compress_interval(mut self, interval: Duration) -> Self {
        self.config.rotation.compress_interval = interval;
        self
    }

    /// Enable or disable the async buffer
    ///
    /// When disabled every entry is written synchronously by the caller.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, enabled: bool) -> Self {
        self.config.async_mode.enabled = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.async_mode.buffer_size = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.async_mode.batch_size = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.async_mode.flush_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.async_mode.shutdown_timeout = timeout;
        self
    }

    /// Split entries into access/error/metrics destinations
    #[must_use = "builder methods return a new value"]
    pub fn separation(mut self, enabled: bool) -> Self {
        self.config.separation.enabled = enabled;
        self
    }

    /// Mirror entries to stdout/stderr
    #[must_use = "builder methods return a new value"]
    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn console_colors(mut self, enabled: bool) -> Self {
        self.config.console.colors = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.config.metrics.enabled = enabled;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the Logger
    pub fn build(self) -> Result<Logger> {
        Logger::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn sync_logger(base: &Path) -> Logger {
        Logger::builder()
            .base_path(base)
            .level(LogLevel::Debug)
            .async_mode(false)
            .compression(false)
            .build()
            .unwrap()
    }

    fn read(path: impl AsRef<Path>) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("logs");
        let result = Logger::builder().base_path(&base).max_backups(0).build();

        assert!(matches!(result, Err(ref e) if e.is_configuration()));
        assert!(!base.exists());
    }

    #[test]
    fn test_unrenderable_timestamp_is_rejected() {
        let dir = tempdir().unwrap();
        for async_mode in [false, true] {
            let base = dir.path().join(format!("async-{}", async_mode));
            let result = Logger::builder()
                .base_path(&base)
                .async_mode(async_mode)
                .timestamp_format(TimestampFormat::Custom("%Q".into()))
                .build();

            assert!(matches!(result, Err(ref e) if e.is_configuration()));
            assert!(!base.exists());
        }
    }

    #[test]
    fn test_component_counts_survive_reset() {
        let dir = tempdir().unwrap();
        let logger = sync_logger(dir.path());
        let bridge = logger.with_component("bridge");
        let again = logger.with_component("bridge").with_field("k", 1);

        bridge.info("one");
        again.info("two");
        assert_eq!(logger.metrics_snapshot().component_counts.get("bridge"), Some(&2));

        logger.reset_metrics();
        bridge.info("three");
        logger.close().unwrap();

        let snapshot = logger.metrics_snapshot();
        assert_eq!(snapshot.component_counts.get("bridge"), Some(&1));
        assert_eq!(snapshot.component_counts.get("app"), None);
    }

    #[test]
    fn test_level_filtering() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder()
            .base_path(dir.path())
            .level(LogLevel::Warn)
            .async_mode(false)
            .compression(false)
            .build()
            .unwrap();

        logger.info("ignored");
        logger.warn("kept");
        logger.close().unwrap();

        let app = read(dir.path().join("app/app.log"));
        assert!(!app.contains("ignored"));
        assert!(app.contains("kept"));
        assert_eq!(logger.metrics_snapshot().total_entries, 1);
    }

    #[test]
    fn test_with_fields_views_share_writers() {
        let dir = tempdir().unwrap();
        let logger = sync_logger(dir.path());

        let request = logger
            .with_field("request_id", "r-1")
            .with_fields(Fields::new().with_field("user", "ana"));
        request.emit(
            LogLevel::Info,
            "tool call",
            Fields::new().with_field("user", "bob"),
        );
        logger.info("plain");
        logger.close().unwrap();

        assert!(logger.bound_fields().is_empty());
        assert_eq!(request.bound_fields().len(), 2);

        let app = read(dir.path().join("app/app.log"));
        let lines: Vec<_> = app.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("request_id=r-1"));
        assert!(lines[0].contains("user=bob"));
        assert!(!lines[1].contains("request_id"));
    }

    #[test]
    fn test_component_view() {
        let dir = tempdir().unwrap();
        let logger = sync_logger(dir.path());
        logger.with_component("bridge").info("proxying");
        logger.info("direct");
        logger.close().unwrap();

        let snapshot = logger.metrics_snapshot();
        assert_eq!(snapshot.component_counts.get("bridge"), Some(&1));
        assert_eq!(snapshot.component_counts.get("app"), Some(&1));
        assert!(read(dir.path().join("app/app.log")).contains("bridge - proxying"));
    }

    #[test]
    fn test_access_and_metric_entries() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder()
            .base_path(dir.path())
            .level(LogLevel::Error)
            .async_mode(false)
            .compression(false)
            .build()
            .unwrap();

        logger.access(AccessRecord::new("GET", "/tools", 200, Duration::from_millis(12)));
        logger.access(AccessRecord::new("POST", "/call", 503, Duration::from_millis(30)));
        logger.metric("queue_depth", Fields::new().with_field("depth", 3));
        logger.close().unwrap();

        let access = read(dir.path().join("access/access.log"));
        assert_eq!(access.lines().count(), 2);
        assert!(access.contains("GET /tools 200"));
        assert!(access.contains("status=200"));

        let errors = read(dir.path().join("error/error.log"));
        assert!(errors.contains("POST /call 503"));

        let metrics = read(dir.path().join("metrics/metrics.log"));
        assert!(metrics.contains("queue_depth"));
        assert!(metrics.contains("depth=3"));

        let snapshot = logger.metrics_snapshot();
        assert_eq!(snapshot.access.total, 2);
        assert_eq!(snapshot.access.status_2xx, 1);
        assert_eq!(snapshot.access.status_5xx, 1);
    }

    #[test]
    fn test_metrics_snapshot_entry() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder()
            .base_path(dir.path())
            .format(OutputFormat::Json)
            .async_mode(false)
            .compression(false)
            .build()
            .unwrap();

        logger.info("one");
        logger.log_metrics_snapshot();
        logger.close().unwrap();

        let line = read(dir.path().join("metrics/metrics.log"));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["message"], "logger_metrics");
        assert_eq!(value["total_entries"], 1);
        assert_eq!(value["level_counts"]["info"], 1);
    }

    #[test]
    fn test_emit_after_close_is_rejected() {
        let dir = tempdir().unwrap();
        let logger = sync_logger(dir.path());
        logger.info("before");
        logger.close().unwrap();
        logger.close().unwrap();

        logger.info("after");
        logger.with_field("k", 1).error("after view");
        assert!(logger.flush().is_ok());
        assert!(matches!(logger.rotate(), Err(LoggerError::LoggerStopped)));

        let snapshot = logger.metrics_snapshot();
        assert_eq!(snapshot.total_entries, 1);
        assert_eq!(snapshot.rejected_count, 2);
        assert!(!read(dir.path().join("app/app.log")).contains("after"));
    }

    #[test]
    fn test_manual_rotation() {
        let dir = tempdir().unwrap();
        let logger = sync_logger(dir.path());
        logger.info("first generation");
        logger.error("first error");

        let rotated = logger.rotate().unwrap();
        assert_eq!(rotated.len(), 2);
        logger.info("second generation");
        logger.close().unwrap();

        assert!(read(dir.path().join("app/app.log.1")).contains("first generation"));
        assert!(read(dir.path().join("app/app.log")).contains("second generation"));
        assert_eq!(logger.metrics_snapshot().rotation_count, 2);
    }

    #[test]
    fn test_async_close_drains() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder()
            .base_path(dir.path())
            .buffer_size(1024)
            .compression(false)
            .build()
            .unwrap();

        for i in 0..500 {
            logger.info(format!("async entry {i}"));
        }
        logger.close().unwrap();

        let app = read(dir.path().join("app/app.log"));
        assert_eq!(app.lines().count(), 500);
        let snapshot = logger.metrics_snapshot();
        assert_eq!(snapshot.accounted_entries(), 500);
        assert_eq!(snapshot.dropped_count, 0);
    }

    #[test]
    fn test_drop_closes_engine() {
        let dir = tempdir().unwrap();
        {
            let logger = Logger::builder()
                .base_path(dir.path())
                .compression(false)
                .build()
                .unwrap();
            logger.info("flushed on drop");
        }
        assert!(read(dir.path().join("app/app.log")).contains("flushed on drop"));
    }

    #[test]
    fn test_builder_from_config() {
        let config = LogConfig::from_json_str(r#"{"level": "warn", "format": "json"}"#).unwrap();
        let builder = LoggerBuilder::from_config(config).component("mcp");
        assert_eq!(builder.config().level, "warn");
        assert_eq!(builder.config().component, "mcp");
    }
}
