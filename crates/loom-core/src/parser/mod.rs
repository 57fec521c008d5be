//! Parser family — turns one raw line into a structured [`LogEntry`].
//!
//! Every parser is total: input it cannot make sense of degrades to
//! [`LogEntry::baseline`] instead of an error. The only failure point is
//! construction of a [`PatternParser`] from an invalid user pattern.
//!
//! | Format | Parser | Recognises |
//! |--------|--------|------------|
//! | `json` | [`JsonParser`] | flat JSON objects with `level`/`msg`/`ts`-style keys |
//! | `clf` | [`ClfParser`] | Apache/Nginx Common Log Format |
//! | `regex` | [`PatternParser`] | user pattern with named capture groups |
//! | `auto` | [`AutoParser`] | JSON → CLF → keyword scan |

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::LogEntry;

mod auto;
mod clf;
mod json;
mod pattern;

pub use auto::AutoParser;
pub use clf::ClfParser;
pub use json::JsonParser;
pub use pattern::PatternParser;

/// Converts a raw log line plus its source path into a [`LogEntry`].
///
/// Implementations must be pure with respect to the input (the timestamp of a
/// baseline record is the only ambient value) and must never panic.
pub trait Parser: Send + Sync {
    fn parse(&self, raw: &str, source: &Path) -> LogEntry;
}

/// Which parser variant to run, as selected by config or CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserFormat {
    #[default]
    Auto,
    Json,
    Clf,
    Regex,
}

impl FromStr for ParserFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(ParserFormat::Auto),
            "json" => Ok(ParserFormat::Json),
            "clf" => Ok(ParserFormat::Clf),
            "regex" => Ok(ParserFormat::Regex),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ParserFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserFormat::Auto => write!(f, "auto"),
            ParserFormat::Json => write!(f, "json"),
            ParserFormat::Clf => write!(f, "clf"),
            ParserFormat::Regex => write!(f, "regex"),
        }
    }
}

/// Build the parser for `format`.
///
/// `pattern` is only consulted for [`ParserFormat::Regex`], where it is
/// required.
pub fn build(format: ParserFormat, pattern: Option<&str>) -> Result<Arc<dyn Parser>> {
    Ok(match format {
        ParserFormat::Auto => Arc::new(AutoParser::new()),
        ParserFormat::Json => Arc::new(JsonParser::new()),
        ParserFormat::Clf => Arc::new(ClfParser::new()),
        ParserFormat::Regex => {
            let pattern = pattern
                .filter(|p| !p.is_empty())
                .ok_or(Error::MissingPattern)?;
            Arc::new(PatternParser::new(pattern)?)
        }
    })
}
