//! Tailer — turns change events into complete lines.
//!
//! One `TrackedFile` per open path holds the handle, the read cursor and any
//! unterminated tail fragment. The committed offset (cursor minus fragment) is
//! what lands in the [`Checkpoint`], so a restart re-reads a half-written line
//! instead of losing it.
//!
//! # Path lifecycle
//!
//! ```text
//! Unopened ──open──► Open ──Remove/Rename──► PendingReconnect ──► Open
//!                                                   │
//!                                                   └── 5 misses ──► GaveUp
//! ```
//!
//! Startup opens resume from the checkpoint, else from end-of-file. Every
//! later open (Create, reconnect) starts at the checkpoint, else at 0; a path
//! that rotated away has its checkpoint reset to 0 so the new file is read in
//! full. Reconnects run as tasks in a [`JoinSet`] owned by the tailer and are
//! aborted on shutdown.

use std::collections::HashMap;
use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use loom_core::checkpoint::Checkpoint;
use loom_core::RawLine;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::watcher::{ChangeEvent, ChangeOp, WatcherHandle};

/// Capacity of the raw line queue.
pub const OUTPUT_CAPACITY: usize = 512;

/// Period of the background checkpoint flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Delay between reconnect probes after a path disappears.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Probes before a vanished path is abandoned.
pub const RECONNECT_ATTEMPTS: u32 = 5;

/// Upper bound on bytes pulled from a file per read.
pub const READ_CHUNK: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// TrackedFile
// ---------------------------------------------------------------------------

/// Device and inode of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

/// Where to start when the checkpoint has nothing for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartAt {
    End,
    Beginning,
}

/// A complete line and the offset just past its terminator.
#[derive(Debug)]
struct Line {
    text: String,
    end: u64,
}

/// Lines from one bounded read.
#[derive(Debug)]
struct Chunk {
    /// Offset the first line starts at.
    first: u64,
    lines: Vec<Line>,
    /// The read filled [`READ_CHUNK`]; the file may hold more.
    more: bool,
}

#[derive(Debug)]
struct TrackedFile {
    file: File,
    /// Bytes consumed from the file so far.
    cursor: u64,
    /// Unterminated tail fragment; never contains `\n`.
    partial: Vec<u8>,
    id: Option<FileId>,
}

impl TrackedFile {
    async fn open(path: &Path, checkpoint: &Checkpoint, fallback: StartAt) -> io::Result<Self> {
        let mut file = File::open(path).await?;
        let meta = file.metadata().await?;
        let len = meta.len();

        let start = match checkpoint.get(path) {
            Some(offset) if offset <= len => offset,
            Some(offset) => {
                tracing::debug!(
                    path = %path.display(),
                    offset,
                    len,
                    "checkpoint beyond end of file, starting over"
                );
                0
            }
            None => match fallback {
                StartAt::End => len,
                StartAt::Beginning => 0,
            },
        };
        file.seek(SeekFrom::Start(start)).await?;

        Ok(Self {
            file,
            cursor: start,
            partial: Vec::new(),
            id: FileId::of(&meta),
        })
    }

    /// Offset just past the last complete line.
    fn offset(&self) -> u64 {
        self.cursor - self.partial.len() as u64
    }

    /// Read up to [`READ_CHUNK`] bytes appended since the last call and split
    /// them into lines.
    async fn read_lines(&mut self, path: &Path) -> io::Result<Chunk> {
        let len = self.file.metadata().await?.len();
        if len < self.cursor {
            tracing::info!(path = %path.display(), len, cursor = self.cursor, "file truncated, reading from start");
            self.file.seek(SeekFrom::Start(0)).await?;
            self.cursor = 0;
            self.partial.clear();
        }

        let first = self.offset();
        let mut base = first;
        let read = (&mut self.file)
            .take(READ_CHUNK)
            .read_to_end(&mut self.partial)
            .await? as u64;
        self.cursor += read;

        let mut lines = Vec::new();
        let mut start = 0;
        for (i, byte) in self.partial.iter().enumerate() {
            if *byte != b'\n' {
                continue;
            }
            let mut raw = &self.partial[start..i];
            if let Some(stripped) = raw.strip_suffix(b"\r") {
                raw = stripped;
            }
            let end = base + (i - start) as u64 + 1;
            lines.push(Line {
                text: String::from_utf8_lossy(raw).into_owned(),
                end,
            });
            base = end;
            start = i + 1;
        }
        self.partial.drain(..start);

        Ok(Chunk {
            first,
            lines,
            more: read == READ_CHUNK,
        })
    }

    /// Whether `path` still names this exact file.
    async fn still_at(&self, path: &Path) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        match tokio::fs::metadata(path).await {
            Ok(meta) => FileId::of(&meta) == Some(id),
            Err(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tailer
// ---------------------------------------------------------------------------

pub struct Tailer {
    watcher: WatcherHandle,
    events: mpsc::Receiver<ChangeEvent>,
    checkpoint: Arc<Checkpoint>,
    output: mpsc::Sender<RawLine>,
    files: HashMap<PathBuf, TrackedFile>,
    reconnects: JoinSet<Option<TrackedFile>>,
    pending: HashMap<task::Id, PathBuf>,
}

impl Tailer {
    /// Build a tailer over the watcher's paths. The returned queue yields every
    /// complete line and closes when the tailer stops.
    pub fn new(
        watcher: WatcherHandle,
        events: mpsc::Receiver<ChangeEvent>,
        checkpoint: Arc<Checkpoint>,
    ) -> (Self, mpsc::Receiver<RawLine>) {
        let (output, lines) = mpsc::channel(OUTPUT_CAPACITY);
        let tailer = Self {
            watcher,
            events,
            checkpoint,
            output,
            files: HashMap::new(),
            reconnects: JoinSet::new(),
            pending: HashMap::new(),
        };
        (tailer, lines)
    }

    /// Tail until the event stream ends or `cancel` fires.
    ///
    /// On exit the checkpoint is flushed one last time, every file handle is
    /// closed and the line queue is closed.
    pub async fn run(mut self, cancel: CancellationToken) {
        let paths = self.watcher.paths().to_vec();
        for path in paths {
            match TrackedFile::open(&path, &self.checkpoint, StartAt::End).await {
                Ok(tracked) => {
                    tracing::debug!(path = %path.display(), offset = tracked.cursor, "tailing");
                    self.files.insert(path.clone(), tracked);
                    if self.drain(&path, &cancel).await.is_break() {
                        return self.shutdown().await;
                    }
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to open file, skipping"),
            }
        }

        let mut flush = tokio::time::interval_at(Instant::now() + FLUSH_INTERVAL, FLUSH_INTERVAL);

        loop {
            let flow = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event, &cancel).await,
                    None => break,
                },
                Some(joined) = self.reconnects.join_next_with_id(), if !self.reconnects.is_empty() => {
                    self.reconnected(joined, &cancel).await
                }
                _ = flush.tick() => {
                    flush_checkpoint(&self.checkpoint).await;
                    ControlFlow::Continue(())
                }
            };
            if flow.is_break() {
                break;
            }
        }

        self.shutdown().await;
    }

    async fn handle(&mut self, event: ChangeEvent, cancel: &CancellationToken) -> ControlFlow<()> {
        let ChangeEvent { path, op } = event;
        match op {
            ChangeOp::Write => {
                if self.files.contains_key(&path) {
                    return self.drain(&path, cancel).await;
                }
            }
            ChangeOp::Create => {
                if !self.files.contains_key(&path) {
                    match TrackedFile::open(&path, &self.checkpoint, StartAt::Beginning).await {
                        Ok(tracked) => {
                            tracing::info!(path = %path.display(), "file created, tailing");
                            self.files.insert(path.clone(), tracked);
                            return self.drain(&path, cancel).await;
                        }
                        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to open created file"),
                    }
                }
            }
            ChangeOp::Remove | ChangeOp::Rename => {
                let Some(tracked) = self.files.get(&path) else {
                    return ControlFlow::Continue(());
                };
                if tracked.still_at(&path).await {
                    tracing::trace!(path = %path.display(), %op, "file unchanged, ignoring");
                    return ControlFlow::Continue(());
                }
                // Pick up anything written before the rotation.
                self.drain(&path, cancel).await?;
                self.files.remove(&path);
                self.disconnected(path, op);
            }
        }
        ControlFlow::Continue(())
    }

    /// Close bookkeeping for a path that went away and start probing for it.
    fn disconnected(&mut self, path: PathBuf, op: ChangeOp) {
        tracing::info!(path = %path.display(), %op, "file gone, waiting for it to reappear");

        if let Err(e) = self.watcher.unwatch(&path) {
            tracing::debug!(path = %path.display(), error = %e, "unwatch after rotation");
        }
        self.checkpoint.set(&path, 0);

        if self.pending.values().any(|p| *p == path) {
            return;
        }
        let handle = self.reconnects.spawn(reconnect(
            path.clone(),
            self.watcher.clone(),
            Arc::clone(&self.checkpoint),
        ));
        self.pending.insert(handle.id(), path);
    }

    async fn reconnected(
        &mut self,
        joined: Result<(task::Id, Option<TrackedFile>), task::JoinError>,
        cancel: &CancellationToken,
    ) -> ControlFlow<()> {
        let (id, tracked) = match joined {
            Ok(done) => done,
            Err(e) => {
                if let Some(path) = self.pending.remove(&e.id()) {
                    tracing::warn!(path = %path.display(), error = %e, "reconnect task failed");
                }
                return ControlFlow::Continue(());
            }
        };
        let Some(path) = self.pending.remove(&id) else {
            return ControlFlow::Continue(());
        };
        let Some(tracked) = tracked else {
            return ControlFlow::Continue(());
        };
        if self.files.contains_key(&path) {
            return ControlFlow::Continue(());
        }

        tracing::info!(path = %path.display(), offset = tracked.cursor, "reconnected");
        self.files.insert(path.clone(), tracked);
        self.drain(&path, cancel).await
    }

    /// Read and emit new lines for a tracked path chunk by chunk, recording the
    /// committed offset after each. Breaks only when the pipeline is shutting
    /// down.
    async fn drain(&mut self, path: &Path, cancel: &CancellationToken) -> ControlFlow<()> {
        loop {
            let Some(tracked) = self.files.get_mut(path) else {
                return ControlFlow::Continue(());
            };

            let chunk = match tracked.read_lines(path).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "read failed, will retry on next write");
                    return ControlFlow::Continue(());
                }
            };

            let mut committed = chunk.first;
            let mut flow = ControlFlow::Continue(());
            for line in chunk.lines {
                let end = line.end;
                let raw = RawLine::new(line.text, path);
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    res = self.output.send(raw) => res.is_ok(),
                };
                if !sent {
                    flow = ControlFlow::Break(());
                    break;
                }
                committed = end;
            }

            if flow.is_continue() {
                committed = tracked.offset();
            }
            self.checkpoint.set(path, committed);

            if flow.is_break() || !chunk.more {
                return flow;
            }
        }
    }

    async fn shutdown(mut self) {
        self.reconnects.abort_all();
        while self.reconnects.join_next().await.is_some() {}
        self.pending.clear();

        flush_checkpoint(&self.checkpoint).await;

        let open = self.files.len();
        self.files.clear();
        tracing::debug!(files = open, "tailer stopped");
    }
}

/// Probe for `path` until it reappears, then re-register and open it.
async fn reconnect(
    path: PathBuf,
    watcher: WatcherHandle,
    checkpoint: Arc<Checkpoint>,
) -> Option<TrackedFile> {
    for attempt in 1..=RECONNECT_ATTEMPTS {
        tokio::time::sleep(RECONNECT_INTERVAL).await;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::trace!(path = %path.display(), attempt, "not there yet");
            continue;
        }
        if let Err(e) = watcher.rewatch(&path) {
            tracing::debug!(path = %path.display(), attempt, error = %e, "rewatch failed");
            continue;
        }
        match TrackedFile::open(&path, &checkpoint, StartAt::Beginning).await {
            Ok(tracked) => return Some(tracked),
            Err(e) => tracing::debug!(path = %path.display(), attempt, error = %e, "reopen failed"),
        }
    }

    tracing::warn!(
        path = %path.display(),
        attempts = RECONNECT_ATTEMPTS,
        "file did not reappear, giving up"
    );
    None
}

async fn flush_checkpoint(checkpoint: &Arc<Checkpoint>) {
    let checkpoint = Arc::clone(checkpoint);
    match task::spawn_blocking(move || checkpoint.save()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "checkpoint save failed"),
        Err(e) => tracing::warn!(error = %e, "checkpoint save task failed"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
