//! loom-feeds — the OS-facing half of the loom pipeline.
//!
//! [`watcher`] expands glob patterns and turns filesystem notifications into
//! [`ChangeEvent`]s; [`tailer`] follows those events, reads newly appended
//! bytes and emits one [`loom_core::RawLine`] per complete line.

pub mod error;
pub mod tailer;
pub mod watcher;

pub use error::{Error, Result};
pub use tailer::Tailer;
pub use watcher::{ChangeEvent, ChangeOp, Watcher, WatcherHandle};
