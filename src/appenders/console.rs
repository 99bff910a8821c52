//! Console appender implementation

use crate::core::{Appender, LogEntry, LogLevel, Result};
use std::io::Write;

/// Mirrors formatted lines to the terminal
///
/// Error and Fatal go to stderr, everything else to stdout. With colors on,
/// the `[LEVEL]` token of text lines is colored by severity.
pub struct ConsoleAppender {
    use_colors: bool,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Apply level coloring to a formatted line
    fn decorate(&self, entry: &LogEntry, line: &str) -> String {
        let line = line.trim_end_matches('\n');
        if !self.use_colors {
            return line.to_string();
        }
        Self::colorize_level(entry.level, line)
    }

    #[cfg(feature = "console")]
    fn colorize_level(level: LogLevel, line: &str) -> String {
        use colored::Colorize;
        let token = format!("[{:5}]", level.to_str());
        let colored = format!("{:5}", level.to_str()).color(level.color_code());
        line.replacen(&token, &format!("[{}]", colored), 1)
    }

    #[cfg(not(feature = "console"))]
    fn colorize_level(_level: LogLevel, line: &str) -> String {
        line.to_string()
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, entry: &LogEntry, line: &str) -> Result<()> {
        let output = self.decorate(entry, line);

        // Route Error and Fatal levels to stderr, others to stdout
        match entry.level {
            LogLevel::Error | LogLevel::Fatal => writeln!(std::io::stderr().lock(), "{}", output)?,
            _ => writeln!(std::io::stdout().lock(), "{}", output)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
