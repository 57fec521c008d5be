//! File watcher — glob expansion plus OS change notifications.
//!
//! ```text
//! notify thread ──(unbounded)──► Watcher::run ──(bounded 256)──► Tailer
//!   raw notify::Event              translate to ChangeEvent
//! ```
//!
//! Every concrete file is watched on its own (non-recursive), so the event
//! stream only ever names paths returned by [`WatcherHandle::paths`].
//!
//! # Event mapping
//!
//! | notify kind | [`ChangeOp`] |
//! |-------------|--------------|
//! | `Create(_)` | `Create` |
//! | `Modify(Name(_))` | `Rename` |
//! | `Modify(Metadata(_))` | `Remove` |
//! | any other `Modify(_)` | `Write` |
//! | `Remove(_)` | `Remove` |
//! | `Access(_)`, `Any`, `Other` | discarded |
//!
//! Unlinking a file that is still held open only changes its link count; the
//! real delete notification arrives when the last handle closes, which for a
//! tailed file is never. So every attribute change is reported as `Remove`
//! without looking at the path: by the time this task runs, a replacement
//! file may already exist. The tailer compares dev/inode against its open
//! handle and ignores the event when nothing moved.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Capacity of the normalized event queue.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    Write,
    Create,
    Remove,
    Rename,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeOp::Write => "write",
            ChangeOp::Create => "create",
            ChangeOp::Remove => "remove",
            ChangeOp::Rename => "rename",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, op: ChangeOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Translation loop from raw notify events to [`ChangeEvent`]s.
pub struct Watcher {
    handle: WatcherHandle,
    raw: mpsc::UnboundedReceiver<notify::Result<Event>>,
    events: mpsc::Sender<ChangeEvent>,
}

/// Shared access to the underlying OS watcher, used by the tailer to drop and
/// re-register paths around rotation.
#[derive(Clone)]
pub struct WatcherHandle {
    inner: Arc<Mutex<RecommendedWatcher>>,
    paths: Arc<[PathBuf]>,
}

impl Watcher {
    /// Expand `patterns` and register every matching file.
    ///
    /// Patterns that fail to parse and files that fail to register are logged
    /// and skipped. Fails only when nothing at all could be watched.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (raw_tx, raw) = mpsc::unbounded_channel();
        let mut os_watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        )?;

        let mut paths = Vec::new();
        for path in expand(patterns) {
            match os_watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => paths.push(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to watch file, skipping")
                }
            }
        }

        if paths.is_empty() {
            return Err(Error::NoMatches(
                patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            ));
        }

        tracing::info!(files = paths.len(), "watcher ready");

        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let watcher = Self {
            handle: WatcherHandle {
                inner: Arc::new(Mutex::new(os_watcher)),
                paths: paths.into(),
            },
            raw,
            events: events_tx,
        };
        Ok((watcher, events_rx))
    }

    pub fn handle(&self) -> WatcherHandle {
        self.handle.clone()
    }

    pub fn paths(&self) -> &[PathBuf] {
        self.handle.paths()
    }

    /// Forward translated events until cancelled, then unregister every path.
    pub async fn run(mut self, cancel: CancellationToken) {
        'outer: loop {
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                raw = self.raw.recv() => raw,
            };

            let event = match raw {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "file watcher error");
                    continue;
                }
                None => break,
            };

            for path in event.paths {
                let Some(op) = translate(&event.kind) else {
                    continue;
                };
                tracing::trace!(path = %path.display(), %op, "change");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'outer,
                    sent = self.events.send(ChangeEvent { path, op }) => {
                        if sent.is_err() {
                            break 'outer;
                        }
                    }
                }
            }
        }

        for path in self.handle.paths() {
            if let Err(e) = self.handle.unwatch(path) {
                tracing::debug!(path = %path.display(), error = %e, "unwatch on shutdown");
            }
        }
        tracing::debug!("watcher stopped");
    }
}

impl WatcherHandle {
    /// De-duplicated watched files, in pattern order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Register `path` again after it was recreated.
    pub fn rewatch(&self, path: &Path) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    pub fn unwatch(&self, path: &Path) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwatch(path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Expand glob patterns to absolute plain-file paths, first occurrence wins.
fn expand<S: AsRef<str>>(patterns: &[S]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "invalid glob pattern, skipping");
                continue;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "glob match unreadable, skipping");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let path = std::path::absolute(&path).unwrap_or(path);
            if seen.insert(path.clone()) {
                out.push(path);
            }
        }
    }

    out
}

fn translate(kind: &EventKind) -> Option<ChangeOp> {
    match kind {
        EventKind::Create(_) => Some(ChangeOp::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeOp::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeOp::Remove),
        EventKind::Modify(_) => Some(ChangeOp::Write),
        EventKind::Remove(_) => Some(ChangeOp::Remove),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn append(path: &Path, bytes: &[u8]) {
        use std::io::Write;
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
        file.sync_all().unwrap();
    }

    fn pattern(dir: &Path, glob: &str) -> String {
        dir.join(glob).to_string_lossy().into_owned()
    }

    #[test]
    fn expand_recurses_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.log"));
        touch(&dir.path().join("nested/deeper/b.log"));
        touch(&dir.path().join("c.txt"));
        fs::create_dir_all(dir.path().join("dir.log")).unwrap();

        let paths = expand(&[pattern(dir.path(), "**/*.log")]);
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.log", "b.log"]);
        assert!(paths.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn expand_deduplicates_overlapping_patterns() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.log"));
        touch(&dir.path().join("b.log"));

        let paths = expand(&[
            pattern(dir.path(), "a.log"),
            pattern(dir.path(), "*.log"),
        ]);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.log"));
        assert!(paths[1].ends_with("b.log"));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.log"));
        let paths = expand(&["[".to_string(), pattern(dir.path(), "*.log")]);
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn no_matches_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Watcher::new(&[pattern(dir.path(), "*.log")]).err().unwrap();
        assert!(matches!(err, Error::NoMatches(p) if p.len() == 1));
    }

    #[test]
    fn translate_maps_kinds() {
        let cases = [
            (EventKind::Create(CreateKind::File), Some(ChangeOp::Create)),
            (EventKind::Modify(ModifyKind::Data(DataChange::Any)), Some(ChangeOp::Write)),
            (EventKind::Modify(ModifyKind::Any), Some(ChangeOp::Write)),
            (EventKind::Modify(ModifyKind::Name(RenameMode::Any)), Some(ChangeOp::Rename)),
            (EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), Some(ChangeOp::Remove)),
            (EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)), Some(ChangeOp::Remove)),
            (EventKind::Remove(RemoveKind::File), Some(ChangeOp::Remove)),
            (EventKind::Access(AccessKind::Any), None),
            (EventKind::Other, None),
            (EventKind::Any, None),
        ];
        for (kind, expected) in cases {
            assert_eq!(translate(&kind), expected, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn unlink_of_open_file_produces_remove_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        touch(&path);
        let held = fs::File::open(&path).unwrap();

        let (watcher, mut events) = Watcher::new(&[pattern(dir.path(), "*.log")]).unwrap();
        let watched = watcher.paths()[0].clone();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(cancel.clone()));

        fs::remove_file(&path).unwrap();
        touch(&path);

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.expect("watcher stopped");
                if event.op == ChangeOp::Remove {
                    break event;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(event.path, watched);

        cancel.cancel();
        task.await.unwrap();
        drop(held);
    }

    #[tokio::test]
    async fn append_produces_write_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        touch(&path);

        let (watcher, mut events) = Watcher::new(&[pattern(dir.path(), "*.log")]).unwrap();
        let watched = watcher.paths()[0].clone();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(cancel.clone()));

        append(&path, b"hello\n");

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.expect("watcher stopped");
                if event.op == ChangeOp::Write {
                    break event;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(event.path, watched);

        cancel.cancel();
        task.await.unwrap();
        assert!(events.recv().await.is_none());
    }
}
