//! loom-core — data model and in-process pipeline stages for loom.
//!
//! # Architecture
//!
//! ```text
//! Watcher ──► Tailer ──► Hub ──┬──► Aggregator
//!  (loom-feeds)   │      parse └──► renderers, dashboard sockets …
//!                 ▼
//!             Checkpoint
//! ```
//!
//! This crate holds everything that does not touch the OS notification layer:
//! the record types, the parser family, the checkpoint store, the broadcast
//! hub and the metrics aggregator. Stages are connected by bounded `tokio`
//! channels and stop cooperatively on a shared
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod aggregator;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod hub;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use types::{Level, LogEntry, RawLine};
