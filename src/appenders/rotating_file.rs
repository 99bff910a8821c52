//! Rotating file appender with size and age based rotation
//!
//! One appender owns one destination's current file. Before every write it
//! checks whether the file reached the size threshold or the age threshold
//! (whichever comes first); if so, the current file is renamed to the next
//! unused numbered suffix, a fresh file is opened, and numbered files beyond
//! the retention count are pruned, oldest first.

use super::layout::{backup_path, list_backups};
use crate::core::appender::Appender;
use crate::core::error::{LoggerError, Result};
use crate::core::log_entry::LogEntry;
use crate::core::metrics::MetricsCollector;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const MAX_DELETION_FAILURES: usize = 5;

/// When to rotate and how much history to keep
///
/// # Examples
///
/// ```
/// use rotating_log_engine::appenders::RotationPolicy;
/// use std::time::Duration;
///
/// // Rotate at 50 MB or after one day, keep 7 rotated files
/// let policy = RotationPolicy::new()
///     .with_max_size(50 * 1024 * 1024)
///     .with_max_age(Duration::from_secs(24 * 3600))
///     .with_max_backups(7);
/// assert_eq!(policy.max_backups, 7);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPolicy {
    /// Rotate once the current file holds this many bytes
    pub max_bytes: u64,
    /// Rotate once the current file is this old
    pub max_age: Duration,
    /// Maximum number of rotated files to keep
    pub max_backups: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024, // 10 MB
            max_age: Duration::from_secs(7 * 24 * 3600),
            max_backups: 5,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }
}

/// Rotating file appender for a single destination
///
/// # Examples
///
/// ```no_run
/// use rotating_log_engine::appenders::{RotatingFileAppender, RotationPolicy};
///
/// let policy = RotationPolicy::new().with_max_size(1024 * 1024).with_max_backups(3);
/// let mut appender = RotatingFileAppender::with_policy("/var/log/mcp/app/app.log", policy).unwrap();
/// appender.write_record(b"hello\n").unwrap();
/// ```
pub struct RotatingFileAppender {
    path: PathBuf,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    /// Creation time of the current file (used for age-based rotation)
    created_at: SystemTime,
    /// Flush the buffer after every record
    write_through: bool,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
    closed: bool,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RotatingFileAppender {
    /// Create a new rotating file appender with the default policy
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// Create a new rotating file appender with custom policy
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size, created_at) = Self::open_current(&path)?;

        Ok(Self {
            path,
            policy,
            writer: Some(BufWriter::new(file)),
            current_size,
            created_at,
            write_through: false,
            deletion_failure_count: 0,
            closed: false,
            metrics: None,
        })
    }

    /// Flush after every record instead of on explicit flush
    #[must_use]
    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    /// Count rotations in the given collector
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn open_current(path: &Path) -> Result<(File, u64, SystemTime)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_appender(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;
        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or_else(|_| SystemTime::now());

        Ok((file, metadata.len(), created_at))
    }

    /// Check the size and age thresholds, whichever comes first
    fn should_rotate(&self) -> bool {
        if self.current_size == 0 {
            return false;
        }
        if self.current_size >= self.policy.max_bytes {
            return true;
        }
        SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or(Duration::ZERO)
            >= self.policy.max_age
    }

    /// Rotate the current file now
    ///
    /// Returns the path the old file was moved to, or `None` when the
    /// current file was empty and nothing was rotated.
    pub fn rotate(&mut self) -> Result<Option<PathBuf>> {
        if self.closed {
            return Err(LoggerError::LoggerStopped);
        }
        if self.current_size == 0 {
            self.created_at = SystemTime::now();
            return Ok(None);
        }

        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
            // Writer is dropped here, releasing file handle
        }

        // newest backup gets the highest index; see the layout module
        let next_index = list_backups(&self.path)
            .map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to scan rotated files: {}", e),
                )
            })?
            .last()
            .map_or(1, |b| b.index + 1);
        let rotated = backup_path(&self.path, next_index);

        fs::rename(&self.path, &rotated).map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to rotate current log file: {}", e),
            )
        })?;

        let (file, size, _) = Self::open_current(&self.path).map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = size;
        self.created_at = SystemTime::now();

        if let Some(ref metrics) = self.metrics {
            metrics.record_rotation();
        }
        self.prune_backups();

        Ok(Some(rotated))
    }

    /// Delete rotated files beyond `max_backups`, oldest first
    ///
    /// `n` and `n.gz` count as one backup.
    fn prune_backups(&mut self) {
        let backups = match list_backups(&self.path) {
            Ok(backups) => backups,
            Err(e) => {
                eprintln!(
                    "[LOGGER WARNING] Failed to list rotated files of {}: {}",
                    self.path.display(),
                    e
                );
                return;
            }
        };

        let indices: BTreeSet<u64> = backups.iter().map(|b| b.index).collect();
        let keep: BTreeSet<u64> = indices.iter().rev().take(self.policy.max_backups).copied().collect();

        let mut deletion_failed = false;
        for backup in backups.iter().filter(|b| !keep.contains(&b.index)) {
            match fs::remove_file(&backup.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    deletion_failed = true;
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove old backup {}: {} (failure #{}/{})",
                        backup.path.display(),
                        e,
                        self.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    );
                }
            }
        }

        if deletion_failed {
            self.deletion_failure_count += 1;
            if self.deletion_failure_count >= MAX_DELETION_FAILURES {
                eprintln!(
                    "[LOGGER ERROR] Old backups of {} could not be deleted {} consecutive times. \
                     This may indicate insufficient permissions.",
                    self.path.display(),
                    self.deletion_failure_count
                );
            }
        } else {
            self.deletion_failure_count = 0;
        }
    }

    /// Write one formatted record, rotating first if a threshold was reached
    pub fn write_record(&mut self, record: &[u8]) -> Result<()> {
        if self.closed {
            return Err(LoggerError::LoggerStopped);
        }

        if self.should_rotate() {
            if let Err(e) = self.rotate() {
                // Keep writing to the current file rather than losing the record
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );

                if self.writer.is_none() {
                    match Self::open_current(&self.path) {
                        Ok((file, size, created_at)) => {
                            self.writer = Some(BufWriter::new(file));
                            self.current_size = size;
                            self.created_at = created_at;
                        }
                        Err(reopen_err) => {
                            eprintln!(
                                "[LOGGER ERROR] Failed to reopen log file after rotation failure: {}",
                                reopen_err
                            );
                            return Err(e);
                        }
                    }
                }

                // Allow the file to grow past the limit instead of retrying on every record
                self.current_size = 0;
                self.created_at = SystemTime::now();
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::file_appender(self.path.display().to_string(), "Writer not initialized"))?;

        writer.write_all(record).map_err(|e| {
            LoggerError::file_appender(
                self.path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        self.current_size += record.len() as u64;

        if self.write_through {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush and release the file handle; later writes fail with `LoggerStopped`
    pub fn close(&mut self) -> Result<()> {
        let result = self.flush();
        self.writer = None;
        self.closed = true;
        result
    }

    /// Bytes in the current file
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Path of the current file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Creation time of the current file
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

impl Appender for RotatingFileAppender {
    fn name(&self) -> &str {
        "RotatingFileAppender"
    }

    fn append(&mut self, _entry: &LogEntry, line: &str) -> Result<()> {
        self.write_record(line.as_bytes())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            // Best effort flush - ignore errors during drop
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::layout::archive_path;
    use crate::core::log_level::LogLevel;
    use std::thread;
    use tempfile::tempdir;

    fn numbered_files(dir: &Path, stem: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(&format!("{}.", stem)))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_rotation_policy_builder() {
        let policy = RotationPolicy::new()
            .with_max_size(1024)
            .with_max_age(Duration::from_secs(60))
            .with_max_backups(3);

        assert_eq!(policy.max_bytes, 1024);
        assert_eq!(policy.max_age, Duration::from_secs(60));
        assert_eq!(policy.max_backups, 3);
    }

    #[test]
    fn test_rotating_appender_creation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("nested").join("test.log");

        let appender = RotatingFileAppender::new(&log_path).unwrap();
        assert_eq!(appender.path(), log_path);
        assert_eq!(appender.current_size(), 0);
        assert!(log_path.exists());
    }

    #[test]
    fn test_log_rotation_size_based() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("rotation.log");

        let policy = RotationPolicy::new().with_max_size(100).with_max_backups(3);
        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();

        for i in 0..20 {
            appender
                .write_record(format!("Test message number {}\n", i).as_bytes())
                .unwrap();
        }
        appender.flush().unwrap();

        let backups = list_backups(&log_path).unwrap();
        assert_eq!(backups.len(), 3);
        // next-unused numbering: the newest history file has the highest index
        assert!(backups.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_log_rotation_age_based() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("age.log");

        let policy = RotationPolicy::new()
            .with_max_age(Duration::from_millis(50))
            .with_max_backups(3);
        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();

        appender.write_record(b"before\n").unwrap();
        thread::sleep(Duration::from_millis(80));
        appender.write_record(b"after\n").unwrap();
        appender.flush().unwrap();

        assert_eq!(fs::read_to_string(backup_path(&log_path, 1)).unwrap(), "before\n");
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "after\n");
    }

    #[test]
    fn test_empty_file_is_not_rotated() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("empty.log");

        let mut appender = RotatingFileAppender::new(&log_path).unwrap();
        assert_eq!(appender.rotate().unwrap(), None);
        assert!(list_backups(&log_path).unwrap().is_empty());
    }

    #[test]
    fn test_manual_rotation_preserves_content() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("manual.log");

        let mut appender = RotatingFileAppender::new(&log_path).unwrap();
        appender.write_record(b"first\n").unwrap();
        let rotated = appender.rotate().unwrap().expect("rotated");
        appender.write_record(b"second\n").unwrap();
        appender.flush().unwrap();

        assert_eq!(rotated, backup_path(&log_path, 1));
        assert_eq!(fs::read_to_string(&rotated).unwrap(), "first\n");
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "second\n");
    }

    #[test]
    fn test_retention_counts_archives() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("multi.log");
        // pre-existing history, one of them already archived
        fs::write(backup_path(&log_path, 1), b"old1").unwrap();
        fs::write(archive_path(&backup_path(&log_path, 2)), b"old2").unwrap();

        let policy = RotationPolicy::new().with_max_size(1).with_max_backups(2);
        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        appender.write_record(b"a\n").unwrap();
        appender.write_record(b"b\n").unwrap();

        assert_eq!(
            numbered_files(dir.path(), "multi.log"),
            vec!["multi.log.2.gz".to_string(), "multi.log.3".to_string()]
        );
    }

    #[test]
    fn test_rotation_is_counted() {
        let dir = tempdir().unwrap();
        let metrics = Arc::new(MetricsCollector::new(true));
        let policy = RotationPolicy::new().with_max_size(10).with_max_backups(2);
        let mut appender = RotatingFileAppender::with_policy(dir.path().join("m.log"), policy)
            .unwrap()
            .with_metrics(Arc::clone(&metrics));

        for _ in 0..4 {
            appender.write_record(b"0123456789\n").unwrap();
        }
        assert_eq!(metrics.snapshot().rotation_count, 3);
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("closed.log");
        let mut appender = RotatingFileAppender::new(&log_path)
            .unwrap()
            .with_write_through(true);

        let entry = LogEntry::new(LogLevel::Info, "x");
        appender.append(&entry, "written\n").unwrap();
        // write-through: visible before any flush
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "written\n");

        appender.close().unwrap();
        assert!(matches!(
            appender.write_record(b"late\n"),
            Err(LoggerError::LoggerStopped)
        ));
    }
}
