//! Logger configuration
//!
//! [`LogConfig`] mirrors the recognized option table: `level`, `format`,
//! `file.*`, `rotation.*`, `async.*`, `separation.*`, plus console and
//! metrics switches. Every section deserializes with defaults, so a partial
//! document is enough. Durations are expressed in milliseconds.
//!
//! # Example
//!
//! ```
//! use rotating_log_engine::core::LogConfig;
//!
//! let config = LogConfig::from_json_str(r#"{
//!     "level": "debug",
//!     "format": "json",
//!     "file": { "base_path": "/var/log/mcp" },
//!     "rotation": { "max_size_mb": 50, "max_backups": 7 },
//!     "async": { "buffer_size": 4096, "flush_interval": 500 }
//! }"#).unwrap();
//!
//! assert_eq!(config.rotation.max_backups, 7);
//! assert!(config.validate().is_ok());
//! ```

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::output_format::OutputFormat;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const SECS_PER_DAY: f64 = 86_400.0;

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Top-level logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum severity emitted downstream of the facade
    pub level: String,
    /// `json` or `text`
    pub format: String,
    /// Component name stamped on entries of the root logger
    pub component: String,
    pub timestamp_format: TimestampFormat,
    pub file: FileConfig,
    pub rotation: RotationConfig,
    #[serde(rename = "async")]
    pub async_mode: AsyncConfig,
    pub separation: SeparationConfig,
    pub console: ConsoleConfig,
    pub metrics: MetricsConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            component: "app".to_string(),
            timestamp_format: TimestampFormat::default(),
            file: FileConfig::default(),
            rotation: RotationConfig::default(),
            async_mode: AsyncConfig::default(),
            separation: SeparationConfig::default(),
            console: ConsoleConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    /// Root directory for all destinations
    pub base_path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_path: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub max_size_mb: f64,
    pub max_age_days: f64,
    pub max_backups: usize,
    pub compress: bool,
    pub compress_after_days: f64,
    /// Period of the background compression sweep
    #[serde(with = "duration_ms")]
    pub compress_interval: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100.0,
            max_age_days: 7.0,
            max_backups: 10,
            compress: true,
            compress_after_days: 1.0,
            compress_interval: Duration::from_secs(3600),
        }
    }
}

impl RotationConfig {
    /// Size threshold in bytes
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0).ceil() as u64
    }

    pub fn max_age(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_age_days * SECS_PER_DAY).unwrap_or(Duration::MAX)
    }

    pub fn compress_after(&self) -> Duration {
        Duration::try_from_secs_f64(self.compress_after_days * SECS_PER_DAY)
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncConfig {
    pub enabled: bool,
    /// Queue capacity, fixed for the logger's lifetime
    pub buffer_size: usize,
    /// Entries per batch handed to the file writers
    pub batch_size: usize,
    #[serde(with = "duration_ms")]
    pub flush_interval: Duration,
    #[serde(with = "duration_ms")]
    pub shutdown_timeout: Duration,
    /// Upper bound on how long an explicit flush waits for the consumer
    #[serde(with = "duration_ms")]
    pub flush_timeout: Duration,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 8192,
            batch_size: 64,
            flush_interval: Duration::from_millis(1000),
            shutdown_timeout: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(1),
        }
    }
}

/// Per-destination splitting switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub enabled: bool,
    pub access: bool,
    pub error: bool,
    pub metrics: bool,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            access: true,
            error: true,
            metrics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            colors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl LogConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check every option and resolve the level and format names
    ///
    /// Runs before any directory or file is touched.
    pub fn validate(&self) -> Result<(LogLevel, OutputFormat)> {
        let level: LogLevel = self
            .level
            .parse()
            .map_err(|e: String| LoggerError::config("level", e))?;
        let format: OutputFormat = self
            .format
            .parse()
            .map_err(|e: String| LoggerError::config("format", e))?;
        self.timestamp_format
            .validate()
            .map_err(|e| LoggerError::config("timestamp_format", e))?;

        if self.file.enabled && self.file.base_path.as_os_str().is_empty() {
            return Err(LoggerError::config(
                "file.base_path",
                "must not be empty when file output is enabled",
            ));
        }

        let rotation = &self.rotation;
        if !(rotation.max_size_mb.is_finite() && rotation.max_size_mb > 0.0) {
            return Err(LoggerError::config(
                "rotation.max_size_mb",
                format!("must be a positive number, got {}", rotation.max_size_mb),
            ));
        }
        if !(rotation.max_age_days.is_finite() && rotation.max_age_days > 0.0) {
            return Err(LoggerError::config(
                "rotation.max_age_days",
                format!("must be a positive number, got {}", rotation.max_age_days),
            ));
        }
        if rotation.max_backups == 0 {
            return Err(LoggerError::config("rotation.max_backups", "must be at least 1"));
        }
        if rotation.compress {
            if !(rotation.compress_after_days.is_finite() && rotation.compress_after_days >= 0.0) {
                return Err(LoggerError::config(
                    "rotation.compress_after_days",
                    format!("must be zero or positive, got {}", rotation.compress_after_days),
                ));
            }
            if rotation.compress_interval.is_zero() {
                return Err(LoggerError::config("rotation.compress_interval", "must be positive"));
            }
        }

        let async_mode = &self.async_mode;
        if async_mode.enabled {
            if async_mode.buffer_size == 0 {
                return Err(LoggerError::config("async.buffer_size", "must be positive"));
            }
            if async_mode.batch_size == 0 {
                return Err(LoggerError::config("async.batch_size", "must be positive"));
            }
            if async_mode.flush_interval.is_zero() {
                return Err(LoggerError::config("async.flush_interval", "must be positive"));
            }
            if async_mode.shutdown_timeout.is_zero() {
                return Err(LoggerError::config("async.shutdown_timeout", "must be positive"));
            }
            if async_mode.flush_timeout.is_zero() {
                return Err(LoggerError::config("async.flush_timeout", "must be positive"));
            }
        }

        Ok((level, format))
    }
}
