use thiserror::Error;

/// Errors surfaced by loom-core.
///
/// Only construction-time failures reach callers as errors. Runtime problems
/// (unreadable lines, failed checkpoint flushes) are logged and absorbed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("unknown parser format {0:?} (expected auto, json, clf or regex)")]
    UnknownFormat(String),

    #[error("unknown output format {0:?} (expected text or json)")]
    UnknownOutput(String),

    #[error("a pattern is required when using the regex parser format")]
    MissingPattern,

    #[error("unknown log level {0:?}")]
    UnknownLevel(String),
}

pub type Result<T> = std::result::Result<T, Error>;
