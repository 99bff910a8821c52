//! # Rotating Log Engine
//!
//! An asynchronous, rotating, multi-destination structured logging engine.
//!
//! ## Features
//!
//! - **Bounded async buffer**: a dedicated writer thread batches entries; a
//!   full queue degrades to a synchronous write instead of blocking or dropping
//! - **Destination split**: application, access, error and metrics files under
//!   one base directory
//! - **Rotation**: size and age triggers with a retention count per destination
//! - **Compression**: background gzip of rotated files past a delay
//! - **Metrics**: lock-free counters with point-in-time snapshots
//!
//! ## Example
//!
//! ```no_run
//! use rotating_log_engine::prelude::*;
//! use std::time::Duration;
//!
//! let logger = Logger::builder()
//!     .base_path("logs")
//!     .level(LogLevel::Info)
//!     .build()?;
//!
//! logger.info("server started");
//! logger.access(AccessRecord::new("GET", "/health", 200, Duration::from_millis(3)));
//! logger.close()?;
//! # Ok::<(), LoggerError>(())
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::ConsoleAppender;
    pub use crate::core::{
        AccessRecord, Category, Destination, FieldValue, Fields, LogConfig, LogEntry, LogLevel,
        Logger, LoggerBuilder, LoggerError, MetricsSnapshot, OutputFormat, Result,
        TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::{debug, error, fatal, fields, info, log, trace, warn};
}

pub use crate::appenders::{ConsoleAppender, RotatingFileAppender, RotationManager, RotationPolicy};
pub use crate::core::{
    AccessRecord, Appender, Category, Destination, FieldValue, Fields, LogConfig, LogEntry,
    LogLevel, Logger, LoggerBuilder, LoggerError, MetricsCollector, MetricsSnapshot,
    OutputFormat, Result, SourceLocation, TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
};
