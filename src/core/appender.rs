//! Appender trait for log output destinations

use super::{error::Result, log_entry::LogEntry};

/// A sink for formatted log lines
///
/// `line` is the already-formatted record (trailing newline included); the
/// entry is passed along for sinks that decorate by level.
pub trait Appender: Send {
    fn append(&mut self, entry: &LogEntry, line: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
