//! Destination routing and the shared write path
//!
//! The route table is an ordered, fixed list built once from
//! [`SeparationConfig`]. Both the async consumer and the synchronous overflow
//! path end up in [`Dispatcher::write_entry`], so every file write goes through
//! the per-destination lock of the [`RotationManager`].

use super::async_writer::EntrySink;
use super::config::SeparationConfig;
use super::destination::{Category, Destination, DestinationSet};
use super::error::Result;
use super::log_entry::LogEntry;
use super::log_level::LogLevel;
use super::metrics::MetricsCollector;
use super::output_format::OutputFormat;
use super::timestamp::TimestampFormat;
use super::Appender;
use crate::appenders::console::ConsoleAppender;
use crate::appenders::rotation_manager::RotationManager;
use parking_lot::Mutex;
use std::sync::Arc;

/// Predicate deciding whether an entry goes to a route's destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRule {
    All,
    MinLevel(LogLevel),
    Category(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub destination: Destination,
    pub rule: RouteRule,
}

impl Route {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self.rule {
            RouteRule::All => true,
            RouteRule::MinLevel(level) => entry.level >= level,
            RouteRule::Category(category) => entry.category == category,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(separation: &SeparationConfig) -> Self {
        let mut routes = vec![Route {
            destination: Destination::Application,
            rule: RouteRule::All,
        }];

        if separation.enabled {
            if separation.error {
                routes.push(Route {
                    destination: Destination::Error,
                    rule: RouteRule::MinLevel(LogLevel::Error),
                });
            }
            if separation.access {
                routes.push(Route {
                    destination: Destination::Access,
                    rule: RouteRule::Category(Category::Access),
                });
            }
            if separation.metrics {
                routes.push(Route {
                    destination: Destination::Metrics,
                    rule: RouteRule::Category(Category::Metrics),
                });
            }
        }

        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Destinations an entry is written to; always contains the application destination
    pub fn route(&self, entry: &LogEntry) -> DestinationSet {
        self.routes
            .iter()
            .filter(|route| route.matches(entry))
            .map(|route| route.destination)
            .collect()
    }
}

/// Formats entries once and hands the bytes to every routed destination
pub struct Dispatcher {
    router: Router,
    format: OutputFormat,
    timestamp_format: TimestampFormat,
    files: Option<RotationManager>,
    console: Option<Mutex<ConsoleAppender>>,
    metrics: Arc<MetricsCollector>,
}

impl Dispatcher {
    pub fn new(
        router: Router,
        format: OutputFormat,
        timestamp_format: TimestampFormat,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            router,
            format,
            timestamp_format,
            files: None,
            console: None,
            metrics,
        }
    }

    pub fn with_files(mut self, files: RotationManager) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_console(mut self, console: ConsoleAppender) -> Self {
        self.console = Some(Mutex::new(console));
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn files(&self) -> Option<&RotationManager> {
        self.files.as_ref()
    }

    /// Close file handles; later file writes are counted as write errors
    pub fn close(&self) -> Result<()> {
        match &self.files {
            Some(files) => files.close(),
            None => Ok(()),
        }
    }
}

impl EntrySink for Dispatcher {
    fn write_entry(&self, entry: &LogEntry) {
        let line = self.format.format(entry, &self.timestamp_format);

        if let Some(files) = &self.files {
            for destination in self.router.route(entry).iter() {
                if let Err(e) = files.write_record(destination, line.as_bytes()) {
                    self.metrics.record_write_error();
                    eprintln!(
                        "[LOGGER ERROR] Failed to write to {} destination: {}",
                        destination.dir_name(),
                        e
                    );
                }
            }
        }

        if let Some(console) = &self.console {
            if let Err(e) = console.lock().append(entry, &line) {
                self.metrics.record_write_error();
                eprintln!("[LOGGER ERROR] Console output failed: {}", e);
            }
        }
    }

    fn flush(&self) -> Result<()> {
        let mut result = match &self.files {
            Some(files) if !files.is_closed() => files.flush_all(),
            _ => Ok(()),
        };
        if let Some(console) = &self.console {
            let console_result = console.lock().flush();
            if result.is_ok() {
                result = console_result;
            }
        }
        self.metrics.record_flush();
        result
    }
}
