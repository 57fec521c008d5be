//! Checkpoint store — durable map of file path → byte offset.
//!
//! The checkpoint is the only state loom persists. It is loaded once at
//! startup, updated by the tailer after every read batch, and flushed to disk
//! periodically and on shutdown.
//!
//! # On-disk format
//!
//! ```json
//! { "offsets": { "/var/log/app.log": 4096 } }
//! ```
//!
//! [`Checkpoint::save`] writes to a sibling temp file and renames it over the
//! target, so a crash mid-write leaves the previous checkpoint intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CheckpointRecord {
    #[serde(default)]
    offsets: BTreeMap<PathBuf, u64>,
}

/// Thread-safe offset map backed by a JSON file.
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    record: RwLock<CheckpointRecord>,
}

impl Checkpoint {
    /// Load the checkpoint at `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty map; opening never
    /// fails.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let record = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt checkpoint");
                CheckpointRecord::default()
            }),
            Err(_) => CheckpointRecord::default(),
        };

        tracing::debug!(
            path = %path.display(),
            files = record.offsets.len(),
            "checkpoint loaded"
        );

        Self {
            path,
            record: RwLock::new(record),
        }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved offset for `file`, if any.
    pub fn get(&self, file: &Path) -> Option<u64> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .offsets
            .get(file)
            .copied()
    }

    pub fn set(&self, file: &Path, offset: u64) {
        self.record
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .offsets
            .insert(file.to_path_buf(), offset);
    }

    pub fn remove(&self, file: &Path) -> Option<u64> {
        self.record
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .offsets
            .remove(file)
    }

    pub fn len(&self) -> usize {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .offsets
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically write the full offset map to disk.
    ///
    /// The map is serialised under the read lock; the file I/O happens after
    /// the lock is released.
    pub fn save(&self) -> Result<()> {
        let bytes = {
            let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_vec_pretty(&*record)?
        };
        atomic_write(&self.path, &bytes)
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    // Unique per process and per call so concurrent saves never share a temp file.
    let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".tmp.{}.{}", std::process::id(), unique));
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpoint::open(dir.path().join("state.json"));
        assert!(ckpt.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ this is not json").unwrap();
        let ckpt = Checkpoint::open(&path);
        assert!(ckpt.is_empty());
    }

    #[test]
    fn save_writes_offsets_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let ckpt = Checkpoint::open(&path);
        ckpt.set(Path::new("/var/log/app.log"), 42);
        ckpt.save().unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc, serde_json::json!({ "offsets": { "/var/log/app.log": 42 } }));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpoint::open(dir.path().join("state.json"));
        ckpt.set(Path::new("a.log"), 1);
        ckpt.save().unwrap();
        ckpt.save().unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        let ckpt = Checkpoint::open(&path);
        ckpt.set(Path::new("a.log"), 7);
        ckpt.save().unwrap();
        assert_eq!(Checkpoint::open(&path).get(Path::new("a.log")), Some(7));
    }

    #[test]
    fn remove_forgets_offset() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpoint::open(dir.path().join("state.json"));
        ckpt.set(Path::new("a.log"), 10);
        assert_eq!(ckpt.remove(Path::new("a.log")), Some(10));
        assert_eq!(ckpt.get(Path::new("a.log")), None);
    }
}
