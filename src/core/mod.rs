//! Core logger types and traits

pub mod appender;
pub mod async_writer;
pub mod compression;
pub mod config;
pub mod destination;
pub mod dispatcher;
pub mod error;
pub mod fields;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod timestamp;

pub use appender::Appender;
pub use async_writer::{AsyncWriter, EntrySink, WriteOutcome, WriterState};
pub use compression::{CompressionManager, CompressionPolicy, SweepReport};
pub use config::{
    AsyncConfig, ConsoleConfig, FileConfig, LogConfig, MetricsConfig, RotationConfig,
    SeparationConfig,
};
pub use destination::{Category, Destination, DestinationSet};
pub use dispatcher::{Dispatcher, Route, RouteRule, Router};
pub use error::{LoggerError, Result};
pub use fields::{FieldValue, Fields};
pub use log_entry::{LogEntry, SourceLocation};
pub use log_level::LogLevel;
pub use logger::{AccessRecord, Logger, LoggerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::{AccessCounts, MetricsCollector, MetricsSnapshot};
pub use output_format::OutputFormat;
pub use timestamp::TimestampFormat;
