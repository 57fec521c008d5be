//! Static log corpora and on-disk fixtures used across harnesses.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

/// Flat JSON lines in the shapes the JSON parser recognises.
pub const CORPUS_JSON: &[&str] = &[
    r#"{"ts":"2026-02-17T10:00:00Z","level":"INFO","message":"Server started","port":8080}"#,
    r#"{"timestamp":"2026-02-17T10:00:01Z","severity":"ERROR","msg":"Connection refused","host":"db.internal","port":5432}"#,
    r#"{"time":"2026-02-17T10:00:02.123Z","level":"warning","message":"Slow query","duration_ms":4200}"#,
    r#"{"ts":"2026-02-17T10:00:03Z","level":"trace","msg":"Cache miss","key":"user:42","ttl":300}"#,
    r#"{"ts":"2026-02-17T10:00:04Z","level":"crit","msg":"Out of memory","rss_mb":16384}"#,
    r#"{"timestamp":"2026-02-17T10:00:05Z","level":"info","msg":"payment accepted","request_id":"req-abc123","status":200}"#,
];

/// Common Log Format access lines, one per status class.
pub const CORPUS_CLF: &[&str] = &[
    r#"127.0.0.1 - frank [17/Feb/2026:12:30:45 +0000] "GET /index.html HTTP/1.1" 200 2326"#,
    r#"10.0.0.7 - - [17/Feb/2026:12:30:46 +0000] "GET /missing HTTP/1.1" 404 153"#,
    r#"10.0.0.8 - - [17/Feb/2026:12:30:47 +0000] "POST /api/pay HTTP/1.1" 500 0"#,
    r#"10.0.0.9 - - [17/Feb/2026:12:30:48 +0000] "GET /health HTTP/1.1" 503 -"#,
    r#"192.168.1.4 - - [17/Feb/2026:12:30:49 +0000] "GET /old HTTP/1.1" 301 0 "-" "curl/8.5.0""#,
];

/// Unstructured lines that only keyword scanning can classify.
pub const CORPUS_UNSTRUCTURED: &[&str] = &[
    "2026-02-17 10:00:00 INFO  Starting application version 2.4.1",
    "2026-02-17 10:00:01 ERROR Failed to connect to database after 3 retries",
    "[2026-02-17T10:00:03Z] WARN: Disk usage at 92% on /dev/sda1",
    "10:00:05.123 [main] DEBUG o.s.w.s.DispatcherServlet - Initializing Servlet",
    "FATAL: could not write to file \"pg_wal/xlogtemp\": No space left on device",
    "GET /api/v1/users 47ms",
];

/// A mixed corpus combining every shape above.
pub const CORPUS_MIXED: &[&str] = &[
    r#"{"ts":"2026-02-17T10:00:00Z","level":"INFO","message":"api-gateway started"}"#,
    r#"10.0.0.7 - - [17/Feb/2026:12:30:46 +0000] "GET /missing HTTP/1.1" 404 153"#,
    "2026-02-17 10:00:02 ERROR worker-1: task queue overflow",
    r#"{"ts":"2026-02-17T10:00:03Z","level":"ERROR","request_id":"req-xyz","message":"upstream timeout"}"#,
    "2026-02-17 10:00:05 INFO  Graceful shutdown complete",
];

/// 1 000 synthetic lines cycling through the mixed shapes, for throughput
/// tests and benches.
pub fn corpus_high_volume() -> Vec<String> {
    (0..1_000usize)
        .map(|i| match i % 4 {
            0 => format!(r#"{{"ts":"2026-02-17T10:00:00Z","level":"info","msg":"request {i}","id":{i}}}"#),
            1 => format!(r#"10.0.0.{} - - [17/Feb/2026:12:30:46 +0000] "GET /item/{i} HTTP/1.1" 200 512"#, i % 255),
            2 => format!("2026-02-17 10:00:00 WARN slow request id={i}"),
            _ => format!("plain line number {i}"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// LogDir
// ---------------------------------------------------------------------------

/// A temporary directory of log files plus a checkpoint location.
pub struct LogDir {
    dir: TempDir,
}

impl LogDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create (or overwrite) `name` with `content`, creating parent dirs.
    pub fn create(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.path(".loom-state.json")
    }
}

impl Default for LogDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `content` to an existing file and flush it to disk.
pub fn append(path: &Path, content: &str) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.sync_all().unwrap();
}

/// Default wait for anything that crosses the OS notification layer.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);
