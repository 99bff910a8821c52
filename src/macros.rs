//! Logging macros for ergonomic log message formatting.
//!
//! The level macros format like `format!`, record the call site as the
//! entry's source location, and skip formatting when the level is filtered
//! out. A leading `{ key => value, ... }` block attaches structured fields.
//!
//! # Examples
//!
//! ```no_run
//! use rotating_log_engine::prelude::*;
//!
//! let logger = Logger::builder().base_path("logs").build()?;
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With structured fields
//! warn!(logger, { "tool" => "search", "attempt" => 3 }, "Retrying tool call");
//! # Ok::<(), LoggerError>(())
//! ```

/// Build a [`Fields`](crate::core::Fields) map.
///
/// # Examples
///
/// ```
/// use rotating_log_engine::fields;
///
/// let fields = fields! { "method" => "GET", "status" => 200 };
/// assert_eq!(fields.len(), 2);
/// assert!(fields!().is_empty());
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::core::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::core::Fields::new()$(.with_field($key, $value))+
    };
}

/// Log a message at an explicit level.
///
/// # Examples
///
/// ```no_run
/// # use rotating_log_engine::prelude::*;
/// # let logger = Logger::builder().build()?;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, { "code" => 500 }, "Error code: {}", 500);
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, { $($key:expr => $value:expr),* $(,)? }, $($arg:tt)+) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.emit_with_location(
                level,
                format!($($arg)+),
                $crate::core::Fields::new()$(.with_field($key, $value))*,
                $crate::core::SourceLocation::new(file!(), line!(), module_path!()),
            );
        }
    }};
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $crate::log!($logger, $level, {}, $($arg)+)
    };
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```no_run
/// # use rotating_log_engine::prelude::*;
/// # let logger = Logger::builder().build()?;
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// error!(logger, { "error" => err }, "Failed to persist session");
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
