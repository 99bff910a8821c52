//! Rotation manager: one rotating writer per destination
//!
//! Writers are created lazily on the first record for a destination. Each
//! destination has its own mutex, so rotation and writes for that destination
//! are serialized while other destinations proceed independently.

use super::layout::FileLayout;
use super::rotating_file::{RotatingFileAppender, RotationPolicy};
use crate::core::destination::Destination;
use crate::core::error::{LoggerError, Result};
use crate::core::metrics::MetricsCollector;
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct RotationManager {
    layout: FileLayout,
    policy: RotationPolicy,
    write_through: bool,
    writers: [Mutex<Option<RotatingFileAppender>>; 4],
    closed: AtomicBool,
    metrics: Arc<MetricsCollector>,
}

impl RotationManager {
    /// Create a manager; no directory or file is touched until the first write
    pub fn new(
        layout: FileLayout,
        policy: RotationPolicy,
        write_through: bool,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            layout,
            policy,
            write_through,
            writers: Default::default(),
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// `io::Write` handle for one destination
    ///
    /// Every `write` call is treated as one whole record.
    pub fn writer(&self, destination: Destination) -> DestinationWriter<'_> {
        DestinationWriter {
            manager: self,
            destination,
        }
    }

    fn with_appender<T>(
        &self,
        destination: Destination,
        f: impl FnOnce(&mut RotatingFileAppender) -> Result<T>,
    ) -> Result<T> {
        let mut slot = self.writers[destination.index()].lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::LoggerStopped);
        }
        if slot.is_none() {
            let appender = RotatingFileAppender::with_policy(
                self.layout.current_path(destination),
                self.policy.clone(),
            )?
            .with_write_through(self.write_through)
            .with_metrics(Arc::clone(&self.metrics));
            *slot = Some(appender);
        }
        match slot.as_mut() {
            Some(appender) => f(appender),
            None => Err(LoggerError::LoggerStopped),
        }
    }

    /// Write one formatted record to a destination
    pub fn write_record(&self, destination: Destination, record: &[u8]) -> Result<()> {
        self.with_appender(destination, |appender| appender.write_record(record))
    }

    /// Flush every open writer; the first error is returned after all were tried
    pub fn flush_all(&self) -> Result<()> {
        let mut first_error = None;
        for slot in &self.writers {
            if let Some(appender) = slot.lock().as_mut() {
                if let Err(e) = crate::core::Appender::flush(appender) {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Rotate one destination out of band
    pub fn rotate(&self, destination: Destination) -> Result<Option<PathBuf>> {
        let mut slot = self.writers[destination.index()].lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::LoggerStopped);
        }
        match slot.as_mut() {
            Some(appender) => appender.rotate(),
            None => Ok(None),
        }
    }

    /// Rotate every open destination; returns the rotated file paths
    pub fn rotate_all(&self) -> Result<Vec<PathBuf>> {
        let mut rotated = Vec::new();
        for destination in Destination::ALL {
            if let Some(path) = self.rotate(destination)? {
                rotated.push(path);
            }
        }
        Ok(rotated)
    }

    /// Close every open writer; later writes fail with `LoggerStopped`
    pub fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let mut first_error = None;
        for slot in &self.writers {
            if let Some(mut appender) = slot.lock().take() {
                if let Err(e) = appender.close() {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Borrowed writer for one destination
pub struct DestinationWriter<'a> {
    manager: &'a RotationManager,
    destination: Destination,
}

impl io::Write for DestinationWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.manager
            .write_record(self.destination, buf)
            .map(|()| buf.len())
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.manager
            .with_appender(self.destination, |appender| crate::core::Appender::flush(appender))
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::layout::list_backups;
    use std::fs;
    use std::io::Write;
    use std::thread;
    use tempfile::tempdir;

    fn manager(base: &std::path::Path, policy: RotationPolicy) -> RotationManager {
        RotationManager::new(
            FileLayout::new(base),
            policy,
            true,
            Arc::new(MetricsCollector::new(true)),
        )
    }

    #[test]
    fn test_lazy_creation() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("logs");
        let manager = manager(&base, RotationPolicy::default());
        assert!(!base.exists());

        manager.write_record(Destination::Error, b"boom\n").unwrap();
        let error_file = base.join("error").join("error.log");
        assert_eq!(fs::read_to_string(error_file).unwrap(), "boom\n");
        assert!(!base.join("access").exists());
    }

    #[test]
    fn test_io_write_handle() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path(), RotationPolicy::default());

        let mut writer = manager.writer(Destination::Access);
        writer.write_all(b"GET /health 200\n").unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("access").join("access.log")).unwrap();
        assert_eq!(content, "GET /health 200\n");
    }

    #[test]
    fn test_rotate_all_skips_unopened() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path(), RotationPolicy::default());
        manager.write_record(Destination::Application, b"a\n").unwrap();

        let rotated = manager.rotate_all().unwrap();
        assert_eq!(rotated.len(), 1);
        assert_eq!(rotated[0], dir.path().join("app").join("app.log.1"));
    }

    #[test]
    fn test_concurrent_writes_never_interleave() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager(
            dir.path(),
            RotationPolicy::new().with_max_size(4096).with_max_backups(100),
        ));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for i in 0..200 {
                        let record = format!("thread-{}-record-{:04}-{}\n", t, i, "x".repeat(40));
                        manager.write_record(Destination::Application, record.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        manager.close().unwrap();

        let current = dir.path().join("app").join("app.log");
        let mut lines = 0;
        let mut paths: Vec<_> = list_backups(&current).unwrap().into_iter().map(|b| b.path).collect();
        paths.push(current);
        for path in paths {
            for line in fs::read_to_string(path).unwrap().lines() {
                assert!(line.starts_with("thread-") && line.ends_with(&"x".repeat(40)), "corrupt line {line:?}");
                lines += 1;
            }
        }
        assert_eq!(lines, 800);
    }

    #[test]
    fn test_close_rejects_writes() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path(), RotationPolicy::default());
        manager.write_record(Destination::Metrics, b"m\n").unwrap();
        manager.close().unwrap();

        assert!(manager.is_closed());
        assert!(matches!(
            manager.write_record(Destination::Metrics, b"late\n"),
            Err(LoggerError::LoggerStopped)
        ));
    }
}
