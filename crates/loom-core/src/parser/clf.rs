use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::Parser;
use crate::{Level, LogEntry};

/// `host ident user [date] "request" status bytes`
const CLF_PATTERN: &str = r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "([^"]*)" (\d{3}) (\S+)"#;

/// chrono format of the bracketed CLF date, e.g. `17/Feb/2026:12:00:00 +0000`.
pub const CLF_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

static CLF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CLF_PATTERN).expect("built-in CLF pattern must compile"));

/// Parses Apache/Nginx Common Log Format lines.
///
/// Combined-format lines match too; the trailing referer and user-agent are
/// ignored. Severity is derived from the HTTP status class.
#[derive(Debug, Clone, Default)]
pub struct ClfParser;

impl ClfParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for ClfParser {
    fn parse(&self, raw: &str, source: &Path) -> LogEntry {
        let mut entry = LogEntry::baseline(raw, source);

        let Some(caps) = CLF_RE.captures(raw) else {
            return entry;
        };

        if let Ok(ts) = DateTime::parse_from_str(&caps[4], CLF_TIME_FORMAT) {
            entry.timestamp = ts.with_timezone(&Utc);
        }

        let status = &caps[6];
        entry.level = status_level(status);
        entry.message = caps[5].to_string();
        entry.fields = BTreeMap::from([
            ("host".to_string(), caps[1].to_string()),
            ("ident".to_string(), caps[2].to_string()),
            ("user".to_string(), caps[3].to_string()),
            ("status".to_string(), status.to_string()),
            ("bytes".to_string(), caps[7].to_string()),
        ]);

        entry
    }
}

/// `5xx → ERROR`, `4xx → WARN`, anything else `INFO`.
fn status_level(status: &str) -> Level {
    match status.as_bytes().first() {
        Some(b'5') => Level::Error,
        Some(b'4') => Level::Warn,
        _ => Level::Info,
    }
}
