//! Domain-specific assertion macros for loom harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear which record invariant was violated.

// ---------------------------------------------------------------------------
// Field assertions
// ---------------------------------------------------------------------------

/// Assert that a `LogEntry` has a specific field with an expected value.
///
/// ```rust
/// assert_has_field!(entry, "status", "404");
/// ```
#[macro_export]
macro_rules! assert_has_field {
    ($entry:expr, $key:expr, $value:expr) => {{
        let entry: &loom_core::LogEntry = &$entry;
        let key: &str = $key;
        let expected: &str = $value;
        match entry.fields.get(key) {
            Some(actual) if actual == expected => {}
            Some(actual) => panic!(
                "assert_has_field! failed:\n  entry.fields[{:?}]\n  expected: {:?}\n  actual:   {:?}",
                key, expected, actual
            ),
            None => panic!(
                "assert_has_field! failed: field {:?} not found in entry.\n  Available fields: {:?}",
                key,
                entry.fields.keys().collect::<Vec<_>>()
            ),
        }
    }};
}

/// Assert that a `LogEntry` carries no extracted fields.
#[macro_export]
macro_rules! assert_no_fields {
    ($entry:expr) => {{
        let entry: &loom_core::LogEntry = &$entry;
        if !entry.fields.is_empty() {
            panic!(
                "assert_no_fields! failed: entry has fields {:?}\n  raw: {:?}",
                entry.fields, entry.raw
            );
        }
    }};
}

// ---------------------------------------------------------------------------
// Level / message assertions
// ---------------------------------------------------------------------------

/// Assert that a `LogEntry` has a specific level.
///
/// ```rust
/// assert_level!(entry, Level::Error);
/// ```
#[macro_export]
macro_rules! assert_level {
    ($entry:expr, $level:expr) => {{
        let entry: &loom_core::LogEntry = &$entry;
        let expected: loom_core::Level = $level;
        if entry.level != expected {
            panic!(
                "assert_level! failed:\n  expected: {:?}\n  actual:   {:?}\n  raw: {:?}",
                expected, entry.level, entry.raw
            );
        }
    }};
}

/// Assert that a record is the untouched baseline for its raw line: `INFO`,
/// message equal to raw, no fields.
#[macro_export]
macro_rules! assert_baseline {
    ($entry:expr) => {{
        let entry: &loom_core::LogEntry = &$entry;
        pretty_assertions::assert_eq!(entry.level, loom_core::Level::Info, "raw: {:?}", entry.raw);
        pretty_assertions::assert_eq!(entry.message, entry.raw);
        $crate::assert_no_fields!(*entry);
    }};
}
