use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::{EventLog, LogError, LogResult, Stream, io_error};

/// Filesystem-backed event log: one JSON Lines file per stream under a data
/// directory. Appends are serialized per stream and fsynced before returning,
/// so a client polling immediately after a write observes it.
#[derive(Debug)]
pub struct FsEventLog {
    root: PathBuf,
    locks: [Mutex<()>; Stream::ALL.len()],
}

impl FsEventLog {
    pub fn open(root: impl AsRef<Path>) -> LogResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| io_error(&root, err))?;
        Ok(Self {
            root,
            locks: Default::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_path(&self, stream: Stream) -> PathBuf {
        self.root.join(stream.file_name())
    }
}

impl EventLog for FsEventLog {
    fn append(&self, stream: Stream, record: &Value) -> LogResult<()> {
        if !record.is_object() {
            return Err(LogError::NotAnObject);
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.stream_path(stream);
        // One complete line per write_all call, under the per-stream lock, so
        // concurrent appenders can never interleave partial records.
        let _guard = self.locks[stream.index()].lock().unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|err| io_error(&path, err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| io_error(&path, err))?;
        file.sync_all().map_err(|err| io_error(&path, err))?;
        Ok(())
    }

    fn scan(&self, stream: Stream) -> LogResult<Vec<Value>> {
        let path = self.stream_path(stream);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&path, err)),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| io_error(&path, err))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(record) if record.is_object() => records.push(record),
                Ok(_) => {
                    tracing::debug!(stream = stream.file_name(), "skipping non-object log line");
                }
                Err(err) => {
                    tracing::debug!(
                        stream = stream.file_name(),
                        %err,
                        "skipping unparseable log line"
                    );
                }
            }
        }
        Ok(records)
    }
}
