//! Background compression of rotated log files
//!
//! A sweep runs once at start and then on every interval tick. Each rotated,
//! uncompressed file older than the configured delay is gzipped into a
//! temporary archive, the archive is verified, renamed into place, and only
//! then is the original removed.

use super::destination::Destination;
use super::error::{LoggerError, Result};
use super::metrics::MetricsCollector;
use crate::appenders::layout::{archive_path, list_backups, temp_archive_path, FileLayout};
use crossbeam_channel::{bounded, select, tick, Sender};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionPolicy {
    /// Minimum age of a rotated file before it is compressed
    pub compress_after: Duration,
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            compress_after: Duration::from_secs(24 * 60 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub compressed: usize,
    pub failed: usize,
    /// Rotated files not yet old enough
    pub pending: usize,
    pub bytes_saved: u64,
}

/// Gzip one rotated file; returns `(original_bytes, archive_bytes)`
///
/// The original is left untouched unless a complete, non-empty archive was
/// renamed into place. Returns `Ok(None)` when the file vanished meanwhile.
pub fn compress_file(path: &Path) -> Result<Option<(u64, u64)>> {
    let display = path.display().to_string();
    let archive = archive_path(path);
    let temp = temp_archive_path(path);

    let input = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(LoggerError::io_operation(
                "compress log file",
                format!("Failed to open file for compression: {}", display),
                e,
            ))
        }
    };
    let original_bytes = input.metadata().map(|m| m.len()).unwrap_or(0);

    let result = write_archive(input, &temp).and_then(|archive_bytes| {
        if archive_bytes == 0 {
            return Err(LoggerError::compression(&display, "archive is empty after compression"));
        }
        if !path.exists() {
            return Ok(None);
        }
        fs::rename(&temp, &archive).map_err(|e| {
            LoggerError::io_operation(
                "compress log file",
                format!("Failed to rename compressed file to: {}", archive.display()),
                e,
            )
        })?;
        Ok(Some(archive_bytes))
    });

    let archive_bytes = match result {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            let _ = fs::remove_file(&temp);
            return Ok(None);
        }
        Err(e) => {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
    };

    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            eprintln!(
                "[LOGGER WARNING] Compressed {} but failed to remove the original: {}",
                display, e
            );
        }
    }

    Ok(Some((original_bytes, archive_bytes)))
}

fn write_archive(input: File, temp: &Path) -> Result<u64> {
    let output = File::create(temp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp.display()),
            e,
        )
    })?;

    let mut reader = BufReader::with_capacity(CHUNK_SIZE, input);
    let mut encoder = GzEncoder::new(BufWriter::with_capacity(CHUNK_SIZE, output), Compression::default());
    io::copy(&mut reader, &mut encoder)
        .map_err(|e| LoggerError::io_operation("compress log file", "Failed to compress data", e))?;

    let file = encoder
        .finish()
        .and_then(|writer| writer.into_inner().map_err(|e| e.into_error()))
        .map_err(|e| LoggerError::io_operation("compress log file", "Failed to finish compression", e))?;
    file.sync_all()
        .map_err(|e| LoggerError::io_operation("compress log file", "Failed to sync archive", e))?;

    Ok(file.metadata()?.len())
}

fn file_age(path: &Path) -> io::Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

/// Compress every eligible rotated file of every destination
///
/// Failures are reported on stderr and counted; the sweep always continues
/// with the next file.
pub fn sweep(layout: &FileLayout, compress_after: Duration, metrics: &MetricsCollector) -> SweepReport {
    let mut report = SweepReport::default();

    for destination in Destination::ALL {
        let current = layout.current_path(destination);
        let backups = match list_backups(&current) {
            Ok(backups) => backups,
            Err(e) => {
                eprintln!(
                    "[LOGGER ERROR] Failed to scan {} for compression: {}",
                    layout.dir(destination).display(),
                    e
                );
                continue;
            }
        };

        for backup in backups.into_iter().filter(|b| !b.compressed) {
            match file_age(&backup.path) {
                Ok(age) if age >= compress_after => {}
                Ok(_) => {
                    report.pending += 1;
                    continue;
                }
                Err(_) => continue,
            }

            match compress_file(&backup.path) {
                Ok(Some((original, compressed))) => {
                    report.compressed += 1;
                    report.bytes_saved += original.saturating_sub(compressed);
                    metrics.record_compression(original, compressed);
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    metrics.record_compression_failure();
                    eprintln!(
                        "[LOGGER ERROR] Failed to compress {}: {}",
                        backup.path.display(),
                        e
                    );
                }
            }
        }
    }

    report
}

/// Periodic compression sweeps on a dedicated thread
pub struct CompressionManager {
    stop_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CompressionManager {
    /// Start the sweeper; the first sweep runs immediately
    pub fn start(layout: FileLayout, policy: CompressionPolicy, metrics: Arc<MetricsCollector>) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("log-compressor".into())
            .spawn(move || {
                let ticker = tick(policy.interval);
                sweep(&layout, policy.compress_after, &metrics);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            sweep(&layout, policy.compress_after, &metrics);
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .map_err(|e| LoggerError::io_operation("spawn", "failed to start log compressor thread", e))?;

        Ok(Self {
            stop_tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop sweeping and wait for a running sweep, up to `timeout`
    ///
    /// Returns `false` when the sweep did not finish in time.
    pub fn stop(&self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.lock().take() else {
            return true;
        };
        let _ = self.stop_tx.try_send(());

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Compression thread panicked: {:?}", e);
                    return false;
                }
                return true;
            }
            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Compression sweep did not finish within {:?}",
                    timeout
                );
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for CompressionManager {
    fn drop(&mut self) {
        self.stop(Duration::from_secs(1));
    }
}
