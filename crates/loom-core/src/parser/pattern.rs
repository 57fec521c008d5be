use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::{Level, LogEntry};

/// Parses lines with a user-supplied regular expression.
///
/// The capture groups `timestamp` (RFC 3339), `level` and `message` feed the
/// corresponding record fields. Every named group that participated in the
/// match, the three above included, is also copied into `fields`.
///
/// ```text
/// ^(?P<timestamp>\S+) (?P<level>\w+) (?P<message>.+)$
/// ```
#[derive(Debug, Clone)]
pub struct PatternParser {
    regex: Regex,
    group_names: Vec<String>,
}

impl PatternParser {
    /// Compile `pattern`. Fails fast on invalid syntax.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)?;
        let group_names = regex
            .capture_names()
            .skip(1)
            .flatten()
            .map(str::to_string)
            .collect();

        Ok(Self { regex, group_names })
    }

    /// Names of the capture groups, in pattern order.
    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }
}

impl Parser for PatternParser {
    fn parse(&self, raw: &str, source: &Path) -> LogEntry {
        let mut entry = LogEntry::baseline(raw, source);

        let Some(caps) = self.regex.captures(raw) else {
            return entry;
        };

        for name in &self.group_names {
            let Some(m) = caps.name(name) else {
                continue;
            };
            let value = m.as_str();

            match name.as_str() {
                "level" => entry.level = Level::normalize(value),
                "message" => entry.message = value.to_string(),
                "timestamp" => {
                    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
                        entry.timestamp = ts.with_timezone(&Utc);
                    }
                }
                _ => {}
            }

            entry.fields.insert(name.clone(), value.to_string());
        }

        entry
    }
}
