//! Hub — parses raw lines once and fans the records out to subscribers.
//!
//! ```text
//!                    ┌──► subscriber (renderer)
//! RawLine ──► parse ─┼──► subscriber (aggregator)
//!                    └──► subscriber (dashboard socket) …
//! ```
//!
//! Delivery is best-effort: each subscriber owns a bounded queue of
//! [`SUBSCRIBER_CAPACITY`] records and a full queue means that subscriber
//! misses the record. The hub never waits on a slow consumer; skipped
//! deliveries are counted and exposed through [`HubHandle::dropped`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::parser::Parser;
use crate::{LogEntry, RawLine};

/// Queue capacity of every subscription.
pub const SUBSCRIBER_CAPACITY: usize = 1024;

/// Receiving end of a hub subscription. Yields `None` once the hub stops.
pub type Subscription = mpsc::Receiver<Arc<LogEntry>>;

#[derive(Default)]
struct Subscribers {
    senders: Vec<mpsc::Sender<Arc<LogEntry>>>,
    /// Set once the hub has stopped; later subscriptions start out closed.
    closed: bool,
}

struct Shared {
    subscribers: RwLock<Subscribers>,
    dropped: AtomicU64,
}

/// The broadcast loop. Owns the input queue and the parser; consumed by
/// [`Hub::run`].
pub struct Hub {
    input: mpsc::Receiver<RawLine>,
    parser: Arc<dyn Parser>,
    shared: Arc<Shared>,
}

/// Cloneable handle for subscribing and reading the drop counter, usable
/// before, during and after [`Hub::run`].
#[derive(Clone)]
pub struct HubHandle {
    shared: Arc<Shared>,
}

impl Hub {
    pub fn new(input: mpsc::Receiver<RawLine>, parser: Arc<dyn Parser>) -> Self {
        Self {
            input,
            parser,
            shared: Arc::new(Shared {
                subscribers: RwLock::new(Subscribers::default()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn handle(&self) -> HubHandle {
        HubHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Parse and broadcast until the input closes or `cancel` fires, then
    /// close every subscriber queue.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::debug!("hub started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = self.input.recv() => match line {
                    Some(line) => {
                        let entry = Arc::new(self.parser.parse(&line.text, &line.source));
                        self.shared.broadcast(entry);
                    }
                    None => break,
                },
            }
        }

        self.shared.close();
        tracing::debug!(
            dropped = self.shared.dropped.load(Ordering::Relaxed),
            "hub stopped"
        );
    }
}

impl HubHandle {
    /// Register a new subscriber that receives every record broadcast from
    /// now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut subs = self
            .shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !subs.closed {
            subs.senders.push(tx);
        }
        rx
    }

    /// Total deliveries skipped because a subscriber's queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }
}

impl Shared {
    fn broadcast(&self, entry: Arc<LogEntry>) {
        let mut any_gone = false;
        {
            let subs = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for tx in &subs.senders {
                match tx.try_send(Arc::clone(&entry)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::trace!(dropped = total, "subscriber queue full, record dropped");
                    }
                    Err(TrySendError::Closed(_)) => any_gone = true,
                }
            }
        }

        if any_gone {
            self.subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .senders
                .retain(|tx| !tx.is_closed());
        }
    }

    fn close(&self) {
        let mut subs = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        subs.closed = true;
        subs.senders.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
