//! Core types for loom-core.
//!
//! This module defines the data structures shared across every pipeline
//! stage: the unparsed [`RawLine`] emitted by the tailer, the structured
//! [`LogEntry`] produced by the parser family, and its [`Level`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One complete line read from a tailed file, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line contents without the trailing terminator (UTF-8 lossy converted).
    pub text: String,
    /// Absolute path of the file the line was read from.
    pub source: PathBuf,
}

impl RawLine {
    pub fn new(text: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// A structured log record.
///
/// Produced exactly once per [`RawLine`] by a single parser invocation and
/// never mutated afterwards. The hub shares it with every subscriber behind an
/// `Arc`.
///
/// The serialized form is the record wire shape used by the JSON renderer and
/// the dashboard: `fields` is omitted entirely when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp parsed from the line, or the parse time when none was found.
    pub timestamp: DateTime<Utc>,
    /// File the line came from.
    pub source: PathBuf,
    /// The original line, verbatim.
    pub raw: String,
    pub level: Level,
    /// Human-readable message; the whole raw line unless a parser found a
    /// dedicated message field.
    pub message: String,
    /// Extra structured data extracted by the parser.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl LogEntry {
    /// The baseline record every parser starts from: `INFO`, `message = raw`,
    /// timestamped now.
    pub fn baseline(raw: &str, source: impl Into<PathBuf>) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            raw: raw.to_string(),
            level: Level::Info,
            message: raw.to_string(),
            fields: BTreeMap::new(),
        }
    }
}

/// Log severity, normalised across every input format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    /// Every level, least to most severe.
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Map a free-form severity string onto the closed level set.
    ///
    /// Case-insensitive and whitespace-trimmed:
    ///
    /// | Input | Level |
    /// |-------|-------|
    /// | `FATAL`, `CRITICAL`, `CRIT` | `Fatal` |
    /// | `ERROR`, `ERR` | `Error` |
    /// | `WARN`, `WARNING` | `Warn` |
    /// | `DEBUG`, `TRACE` | `Debug` |
    /// | anything else, including empty | `Info` |
    pub fn normalize(s: &str) -> Level {
        match s.trim().to_ascii_uppercase().as_str() {
            "FATAL" | "CRITICAL" | "CRIT" => Level::Fatal,
            "ERROR" | "ERR" => Level::Error,
            "WARN" | "WARNING" => Level::Warn,
            "DEBUG" | "TRACE" => Level::Debug,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` so callers can write `{:<5}` for aligned level tags.
        f.pad(self.as_str())
    }
}

/// Strict parse: only the five canonical names (any case) are accepted.
/// Use [`Level::normalize`] for lenient, alias-aware mapping.
impl FromStr for Level {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::UnknownLevel(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
