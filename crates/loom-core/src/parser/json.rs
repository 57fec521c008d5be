use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::Parser;
use crate::{Level, LogEntry};

/// Parses flat JSON objects.
///
/// Recognised keys are decoded into [`JsonLine`]; everything else lands in the
/// flattened residual map and is copied into `fields` as strings. Input that
/// is not a JSON object yields the baseline record unchanged.
#[derive(Debug, Clone, Default)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

/// Known keys, first match wins within each group.
#[derive(Debug, Deserialize)]
struct JsonLine {
    level: Option<Value>,
    severity: Option<Value>,
    message: Option<Value>,
    msg: Option<Value>,
    timestamp: Option<Value>,
    time: Option<Value>,
    ts: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Parser for JsonParser {
    fn parse(&self, raw: &str, source: &Path) -> LogEntry {
        let mut entry = LogEntry::baseline(raw, source);

        let line: JsonLine = match serde_json::from_str(raw) {
            Ok(line) => line,
            Err(_) => return entry,
        };

        if let Some(level) = first_string([&line.level, &line.severity]) {
            entry.level = Level::normalize(&level);
        }
        if let Some(message) = first_string([&line.message, &line.msg]) {
            entry.message = message;
        }
        if let Some(ts) = first_string([&line.timestamp, &line.time, &line.ts]) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&ts) {
                entry.timestamp = parsed.with_timezone(&Utc);
            }
        }

        entry.fields = line
            .rest
            .into_iter()
            .map(|(key, value)| (key, stringify(value)))
            .collect();

        entry
    }
}

/// First present, non-empty value of `candidates`, stringified.
fn first_string<const N: usize>(candidates: [&Option<Value>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|v| stringify(v.clone()))
        .find(|s| !s.is_empty())
}

/// Strings pass through unquoted; every other value uses its JSON text.
pub(crate) fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use pretty_assertions::assert_eq;

    fn parse(raw: &str) -> LogEntry {
        JsonParser::new().parse(raw, Path::new("/var/log/app.log"))
    }

    #[test]
    fn extracts_known_keys() {
        let entry = parse(
            r#"{"level":"error","message":"disk full","timestamp":"2026-02-17T12:00:00Z"}"#,
        );
        assert_eq!(entry.level, Level::Error);
        assert_eq!(entry.message, "disk full");
        assert_eq!(entry.timestamp.year(), 2026);
        assert_eq!(entry.source, Path::new("/var/log/app.log"));
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn alternate_key_names() {
        let entry = parse(r#"{"severity":"warning","msg":"high latency","ts":"2026-02-17T12:00:00Z"}"#);
        assert_eq!(entry.level, Level::Warn);
        assert_eq!(entry.message, "high latency");
    }

    #[test]
    fn residual_keys_become_string_fields() {
        let entry = parse(r#"{"msg":"ok","port":8080,"tls":true,"peer":"10.0.0.1","ctx":{"a":1}}"#);
        assert_eq!(entry.fields["port"], "8080");
        assert_eq!(entry.fields["tls"], "true");
        assert_eq!(entry.fields["peer"], "10.0.0.1");
        assert_eq!(entry.fields["ctx"], r#"{"a":1}"#);
        assert!(!entry.fields.contains_key("msg"));
    }

    #[test]
    fn bad_timestamp_keeps_now() {
        let before = Utc::now();
        let entry = parse(r#"{"msg":"x","time":"yesterday"}"#);
        assert!(entry.timestamp >= before);
    }

    #[test]
    fn invalid_json_is_baseline() {
        let entry = parse("not json at all");
        assert_eq!(entry.message, "not json at all");
        assert_eq!(entry.level, Level::Info);
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn non_object_json_is_baseline() {
        let entry = parse("[1,2,3]");
        assert_eq!(entry.message, "[1,2,3]");
    }

    #[test]
    fn empty_message_falls_through_to_msg() {
        let entry = parse(r#"{"message":"","msg":"second"}"#);
        assert_eq!(entry.message, "second");
    }
}
