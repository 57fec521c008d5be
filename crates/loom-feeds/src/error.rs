use thiserror::Error;

/// Errors surfaced by loom-feeds.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("no files matched the given patterns: {0:?}")]
    NoMatches(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;
