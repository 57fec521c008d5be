//! Test builders — ergonomic constructors for records and configs.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use loom_core::config::{Config, OutputFormat};
use loom_core::parser::ParserFormat;
use loom_core::{Level, LogEntry};

// ---------------------------------------------------------------------------
// LogEntryBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LogEntry`] test fixtures. Defaults to a fixed
/// timestamp so rendered output is stable.
///
/// # Example
///
/// ```rust
/// let entry = LogEntryBuilder::new("timeout connecting to db")
///     .level(Level::Error)
///     .source("/var/log/api.log")
///     .field("request_id", "req-abc123")
///     .build();
/// ```
pub struct LogEntryBuilder {
    raw: String,
    timestamp: DateTime<Utc>,
    level: Level,
    source: PathBuf,
    fields: BTreeMap<String, String>,
    message: Option<String>,
}

impl LogEntryBuilder {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            timestamp: fixed_time(),
            level: Level::Info,
            source: PathBuf::from("/var/log/app.log"),
            fields: BTreeMap::new(),
            message: None,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn build(self) -> LogEntry {
        LogEntry {
            timestamp: self.timestamp,
            source: self.source,
            message: self.message.unwrap_or_else(|| self.raw.clone()),
            raw: self.raw,
            level: self.level,
            fields: self.fields,
        }
    }
}

/// 2026-02-17T12:00:00Z
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 17, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder over [`Config::defaults`].
///
/// ```rust
/// let config = ConfigBuilder::new()
///     .watch(&log_dir.path("app.log"))
///     .checkpoint(log_dir.checkpoint_path())
///     .build();
/// ```
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::defaults(),
        }
    }

    /// Add a literal path or glob pattern to watch.
    pub fn watch(mut self, pattern: impl AsRef<Path>) -> Self {
        self.config
            .watch
            .patterns
            .push(pattern.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.watch.checkpoint = path.into();
        self
    }

    pub fn format(mut self, format: ParserFormat) -> Self {
        self.config.parser.format = format;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.parser.pattern = pattern.into();
        self
    }

    pub fn output(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
