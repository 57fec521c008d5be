//! loom — real-time log tailing, parsing and fan-out.
//!
//! The binary is a thin shell over [`pipeline::run`]. The library surface
//! exists so integration tests and benches can assemble the same pipeline the
//! binary runs.
//!
//! # Architecture
//!
//! ```text
//! Watcher ──► Tailer ──► Hub ──┬──► Aggregator ──► dashboard /api/stats
//!                              ├──► renderer (text | json) ──► stdout
//!                              └──► dashboard /ws
//! ```
//!
//! Every stage runs as its own `tokio` task connected by bounded channels and
//! stops on a shared [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod output;
pub mod pipeline;

pub use loom_core::{Level, LogEntry, RawLine};
pub use pipeline::{Pipeline, Running};
