//! Append-only event log abstraction plus filesystem and in-memory backends.
//!
//! The log is the single source of truth: every mutating operation appends
//! one record to a stream, every read re-folds the stream. Records are never
//! updated or deleted.

mod fs;
mod mem;

pub use fs::FsEventLog;
pub use mem::MemEventLog;

use serde_json::Value;
use std::{io, path::PathBuf, sync::Arc};

pub type LogResult<T> = Result<T, LogError>;
pub type DynEventLog = Arc<dyn EventLog>;

/// One named append-only sequence of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Job creation, claim, progress, and completion events.
    Jobs,
    /// Device status snapshots.
    Status,
    /// Device administrative events (alias, forget).
    Devices,
    /// Per-device file-state reports.
    Reports,
}

impl Stream {
    pub const ALL: [Stream; 4] = [Stream::Jobs, Stream::Status, Stream::Devices, Stream::Reports];

    pub fn file_name(self) -> &'static str {
        match self {
            Stream::Jobs => "jobs.jsonl",
            Stream::Status => "status.jsonl",
            Stream::Devices => "devices.jsonl",
            Stream::Reports => "reports.jsonl",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Stream::Jobs => 0,
            Stream::Status => 1,
            Stream::Devices => 2,
            Stream::Reports => 3,
        }
    }
}

/// Uniform interface implemented by concrete log backends (filesystem,
/// in-memory) so readers and writers target a single abstraction.
pub trait EventLog: Send + Sync {
    /// Durably appends one record. The write is atomic from a reader's point
    /// of view: the record is fully persisted before this returns, and a
    /// concurrent scan sees either the whole record or none of it.
    fn append(&self, stream: Stream, record: &Value) -> LogResult<()>;

    /// Returns every successfully-parsed record in append order. A record
    /// that fails to parse is skipped; it never aborts the rest of the scan.
    fn scan(&self, stream: Stream) -> LogResult<Vec<Value>>;
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("log records must be JSON objects")]
    NotAnObject,
    #[error("record encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> LogError {
    LogError::Io {
        path: path.into(),
        source: err,
    }
}
