//! Aggregator — live pipeline metrics from one hub subscription.
//!
//! Counts every record by level and keeps a sliding window of arrival times
//! for a trailing [`RATE_WINDOW`] throughput figure. Drop and file counts are
//! not tracked here; they are read through accessor closures injected at
//! construction so the aggregator stays independent of the hub and watcher
//! types.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::hub::Subscription;
use crate::Level;

/// Length of the trailing window used for `events_per_second`.
pub const RATE_WINDOW: Duration = Duration::from_secs(5);

/// How often expired window entries are discarded.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(2);

/// Accessor for the hub's cumulative drop count.
pub type DroppedFn = Box<dyn Fn() -> u64 + Send + Sync>;

/// Accessor for the number of watched files.
pub type FilesFn = Box<dyn Fn() -> usize + Send + Sync>;

/// Point-in-time metrics. Recomputed on every [`AggregatorHandle::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    /// Time since the aggregator was created, whole seconds.
    #[serde(serialize_with = "serialize_uptime")]
    pub uptime: Duration,
    pub total_events: u64,
    pub events_per_second: f64,
    pub level_counts: BTreeMap<Level, u64>,
    pub dropped_logs: u64,
    pub files_watched: usize,
}

#[derive(Default)]
struct Counters {
    total_events: u64,
    level_counts: BTreeMap<Level, u64>,
    /// Arrival instants, oldest first.
    window: VecDeque<Instant>,
}

struct Shared {
    started: Instant,
    counters: RwLock<Counters>,
    dropped: DroppedFn,
    files: FilesFn,
}

pub struct Aggregator {
    entries: Subscription,
    shared: Arc<Shared>,
}

#[derive(Clone)]
pub struct AggregatorHandle {
    shared: Arc<Shared>,
}

impl Aggregator {
    pub fn new(entries: Subscription, dropped: DroppedFn, files: FilesFn) -> Self {
        Self {
            entries,
            shared: Arc::new(Shared {
                started: Instant::now(),
                counters: RwLock::new(Counters::default()),
                dropped,
                files,
            }),
        }
    }

    pub fn handle(&self) -> AggregatorHandle {
        AggregatorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Consume the subscription until it closes or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut prune = tokio::time::interval_at(Instant::now() + PRUNE_INTERVAL, PRUNE_INTERVAL);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                entry = self.entries.recv() => match entry {
                    Some(entry) => self.shared.record(entry.level),
                    None => break,
                },
                _ = prune.tick() => self.shared.prune(),
            }
        }

        tracing::debug!("aggregator stopped");
    }
}

impl AggregatorHandle {
    /// Consistent snapshot of the counters: one lock covers every value read
    /// locally, so no partially applied record is ever visible.
    pub fn snapshot(&self) -> Stats {
        let now = Instant::now();
        let (total_events, level_counts, recent) = {
            let c = self
                .shared
                .counters
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            (c.total_events, c.level_counts.clone(), recent_count(&c.window, now))
        };

        Stats {
            uptime: Duration::from_secs(now.duration_since(self.shared.started).as_secs()),
            total_events,
            events_per_second: recent as f64 / RATE_WINDOW.as_secs_f64(),
            level_counts,
            dropped_logs: (self.shared.dropped)(),
            files_watched: (self.shared.files)(),
        }
    }
}

impl Shared {
    fn record(&self, level: Level) {
        let mut c = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        c.total_events += 1;
        *c.level_counts.entry(level).or_default() += 1;
        c.window.push_back(Instant::now());
    }

    fn prune(&self) {
        let now = Instant::now();
        let mut c = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        while c
            .window
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= RATE_WINDOW)
        {
            c.window.pop_front();
        }
    }
}

/// Entries strictly newer than `now - RATE_WINDOW`.
fn recent_count(window: &VecDeque<Instant>, now: Instant) -> usize {
    let expired = window.partition_point(|t| now.saturating_duration_since(*t) >= RATE_WINDOW);
    window.len() - expired
}

/// Render a duration compactly: `0s`, `42s`, `3m5s`, `1h0m12s`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        let _ = write!(out, "{h}h{m}m");
    } else if m > 0 {
        let _ = write!(out, "{m}m");
    }
    let _ = write!(out, "{s}s");
    out
}

fn serialize_uptime<S: Serializer>(uptime: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_uptime(*uptime))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
