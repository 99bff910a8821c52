//! On-disk layout of the destination file sets
//!
//! ```text
//! base_path/
//!   app/app.log            current file
//!   app/app.log.3          rotated, uncompressed
//!   app/app.log.2.gz       rotated, compressed
//!   access/access.log
//!   error/error.log
//!   metrics/metrics.log
//! ```
//!
//! Rotated files take the next unused index, so a higher index is a newer
//! file and history files are never renamed.
//!
//! This is the opposite of logrotate-style numbering, where `.1` is always
//! the newest file and every rotation shifts older files up by one. Here the
//! oldest retained file has the lowest index, and pruning removes the lowest
//! indices first.

use crate::core::destination::Destination;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const ARCHIVE_EXTENSION: &str = "gz";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    base_path: PathBuf,
}

impl FileLayout {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn dir(&self, destination: Destination) -> PathBuf {
        self.base_path.join(destination.dir_name())
    }

    pub fn current_path(&self, destination: Destination) -> PathBuf {
        self.dir(destination)
            .join(format!("{}.log", destination.dir_name()))
    }
}

/// A rotated file belonging to some current file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub index: u64,
    pub path: PathBuf,
    pub compressed: bool,
}

/// Path of the rotated file with the given index
pub fn backup_path(current: &Path, index: u64) -> PathBuf {
    let mut name = current.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}", index));
    current.with_file_name(name)
}

/// Path of the archive produced from a rotated file
pub fn archive_path(backup: &Path) -> PathBuf {
    let mut name = backup.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}", ARCHIVE_EXTENSION));
    backup.with_file_name(name)
}

/// Path of the in-progress archive
pub fn temp_archive_path(backup: &Path) -> PathBuf {
    let mut name = archive_path(backup).file_name().unwrap_or_default().to_os_string();
    name.push(TEMP_SUFFIX);
    backup.with_file_name(name)
}

/// Parse `<current>.<n>` or `<current>.<n>.gz`; anything else is not a backup
pub fn parse_backup_name(file_name: &str, current_name: &str) -> Option<(u64, bool)> {
    let rest = file_name.strip_prefix(current_name)?.strip_prefix('.')?;
    let (digits, compressed) = match rest.strip_suffix(&format!(".{}", ARCHIVE_EXTENSION)) {
        Some(digits) => (digits, true),
        None => (rest, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|index| (index, compressed))
}

/// All rotated files next to `current`, ordered by index then uncompressed first
pub fn list_backups(current: &Path) -> io::Result<Vec<BackupFile>> {
    let Some(dir) = current.parent() else {
        return Ok(Vec::new());
    };
    let Some(current_name) = current.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some((index, compressed)) = parse_backup_name(name, current_name) {
            backups.push(BackupFile {
                index,
                path: entry.path(),
                compressed,
            });
        }
    }
    backups.sort_by_key(|b| (b.index, b.compressed));
    Ok(backups)
}
