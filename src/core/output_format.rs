//! Output format for log lines
//!
//! - Text: human-readable line with trailing `key=value` fields
//! - Json: one JSON object per line (JSONL), compatible with ELK, Loki, etc.

use super::destination::Category;
use super::log_entry::{escape_line_breaks, LogEntry};
use super::timestamp::TimestampFormat;
use std::fmt;
use std::str::FromStr;

const RESERVED_KEYS: [&str; 6] = ["timestamp", "level", "message", "component", "category", "caller"];

/// Output format for log entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    ///
    /// Example: `[2025-01-08T10:30:45.123Z] [INFO ] mcp - Request processed method=tools/call`
    #[default]
    Text,

    /// JSON format for machine processing
    ///
    /// Example: `{"component":"mcp","level":"INFO","message":"Request processed","timestamp":"..."}`
    Json,
}

impl OutputFormat {
    /// Format a log entry as one line, including the trailing newline
    pub fn format(&self, entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        let mut line = match self {
            OutputFormat::Text => Self::format_text(entry, timestamp_format),
            OutputFormat::Json => Self::format_json(entry, timestamp_format),
        };
        line.push('\n');
        line
    }

    fn format_text(entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        let timestamp = timestamp_format.format(&entry.timestamp);
        let mut line = format!(
            "[{}] [{:5}]",
            escape_line_breaks(&timestamp),
            entry.level.to_str(),
        );
        // entries built by hand skip the constructor escaping
        if !entry.component.is_empty() {
            line.push(' ');
            line.push_str(&escape_line_breaks(&entry.component));
            line.push_str(" -");
        }
        line.push(' ');
        line.push_str(&escape_line_breaks(&entry.message));

        if !entry.fields.is_empty() {
            line.push(' ');
            line.push_str(&entry.fields.format_fields());
        }
        if let Some(ref location) = entry.location {
            line.push_str(&format!(" ({})", location));
        }
        line
    }

    fn format_json(entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        let mut json_obj = serde_json::Map::new();

        let timestamp = if timestamp_format.is_numeric() {
            timestamp_format
                .format(&entry.timestamp)
                .parse::<i64>()
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or_else(|_| serde_json::Value::String(timestamp_format.format(&entry.timestamp)))
        } else {
            serde_json::Value::String(timestamp_format.format(&entry.timestamp))
        };
        json_obj.insert("timestamp".to_string(), timestamp);
        json_obj.insert(
            "level".to_string(),
            serde_json::Value::String(entry.level.to_str().to_string()),
        );
        json_obj.insert(
            "message".to_string(),
            serde_json::Value::String(entry.message.clone()),
        );
        if !entry.component.is_empty() {
            json_obj.insert(
                "component".to_string(),
                serde_json::Value::String(entry.component.clone()),
            );
        }
        if entry.category != Category::Application {
            json_obj.insert(
                "category".to_string(),
                serde_json::to_value(entry.category).unwrap_or(serde_json::Value::Null),
            );
        }
        if let Some(ref location) = entry.location {
            json_obj.insert(
                "caller".to_string(),
                serde_json::Value::String(location.to_string()),
            );
        }

        // Reserved keys keep their meaning; colliding fields move under "fields."
        for (key, value) in &entry.fields {
            let key = if RESERVED_KEYS.contains(&key.as_str()) {
                format!("fields.{}", key)
            } else {
                key.clone()
            };
            json_obj.insert(key, value.to_json_value());
        }

        serde_json::Value::Object(json_obj).to_string()
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "console" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid log format: '{}' (expected 'json' or 'text')", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fields::Fields;
    use crate::core::log_entry::SourceLocation;
    use crate::core::log_level::LogLevel;

    fn sample_entry() -> LogEntry {
        LogEntry::new(LogLevel::Info, "Request processed")
            .with_component("mcp")
            .with_fields(
                Fields::new()
                    .with_field("method", "tools/call")
                    .with_field("level", "shadowed"),
            )
    }

    #[test]
    fn test_text_format() {
        let line = OutputFormat::Text.format(&sample_entry(), &TimestampFormat::Iso8601);
        assert!(line.ends_with('\n'));
        assert!(line.contains("[INFO ] mcp - Request processed"));
        assert!(line.contains("method=tools/call"));
    }

    #[test]
    fn test_text_format_location() {
        let entry = LogEntry::new(LogLevel::Error, "boom")
            .with_location(SourceLocation::new("src/main.rs", 7, "main"));
        let line = OutputFormat::Text.format(&entry, &TimestampFormat::Iso8601);
        assert!(line.trim_end().ends_with("boom (src/main.rs:7)"));
    }

    #[test]
    fn test_text_format_is_one_line() {
        let mut entry = LogEntry::new(LogLevel::Warn, "m")
            .with_fields(Fields::new().with_field("k\n[x] [ERROR] forged", 1));
        entry.component = "c\n[x] [FATAL] forged2".to_string();
        let timestamps = TimestampFormat::Custom("%Y%n%m".to_string());

        let line = OutputFormat::Text.format(&entry, &timestamps);
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("c\\n[x] [FATAL] forged2 - m"));
        assert!(line.contains("k\\n[x] [ERROR] forged=1"));
    }

    #[test]
    fn test_json_format() {
        let line = OutputFormat::Json.format(&sample_entry(), &TimestampFormat::Iso8601);
        let parsed: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();

        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["message"], "Request processed");
        assert_eq!(parsed["component"], "mcp");
        assert_eq!(parsed["method"], "tools/call");
        assert_eq!(parsed["fields.level"], "shadowed");
        assert!(parsed.get("category").is_none());
    }

    #[test]
    fn test_json_numeric_timestamp() {
        let line = OutputFormat::Json.format(&sample_entry(), &TimestampFormat::UnixMillis);
        let parsed: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert!(parsed["timestamp"].is_i64());
    }

    #[test]
    fn test_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
