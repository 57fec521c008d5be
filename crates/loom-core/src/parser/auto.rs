use std::path::Path;

use super::{ClfParser, JsonParser, Parser};
use crate::{Level, LogEntry};

/// Keyword priority for unstructured lines.
const KEYWORDS: [(&str, Level); 4] = [
    ("FATAL", Level::Fatal),
    ("ERROR", Level::Error),
    ("WARN", Level::Warn),
    ("DEBUG", Level::Debug),
];

/// Format auto-detection: JSON → CLF → keyword scan.
///
/// A structured parser "wins" only if it replaced the message; a JSON line
/// with a `level` but no message therefore still goes through keyword
/// scanning.
#[derive(Debug, Clone, Default)]
pub struct AutoParser {
    json: JsonParser,
    clf: ClfParser,
}

impl AutoParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Parser for AutoParser {
    fn parse(&self, raw: &str, source: &Path) -> LogEntry {
        if raw.trim_start().starts_with('{') {
            let entry = self.json.parse(raw, source);
            if entry.message != raw {
                return entry;
            }
        }

        let entry = self.clf.parse(raw, source);
        if entry.message != raw {
            return entry;
        }

        keyword_scan(raw, source)
    }
}

/// Baseline record whose level is the first keyword found in the upper-cased
/// line. The message is left as the full raw line.
fn keyword_scan(raw: &str, source: &Path) -> LogEntry {
    let mut entry = LogEntry::baseline(raw, source);
    let upper = raw.to_uppercase();
    if let Some((_, level)) = KEYWORDS.iter().find(|(kw, _)| upper.contains(kw)) {
        entry.level = *level;
    }
    entry
}
