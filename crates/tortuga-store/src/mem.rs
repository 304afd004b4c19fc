use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::{EventLog, LogError, LogResult, Stream};

/// Simple in-memory event log for unit tests and embedded scenarios.
#[derive(Debug, Default, Clone)]
pub struct MemEventLog {
    streams: Arc<Mutex<HashMap<Stream, Vec<Value>>>>,
}

impl MemEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, stream: Stream) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(&stream)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, stream: Stream) -> bool {
        self.len(stream) == 0
    }
}

impl EventLog for MemEventLog {
    fn append(&self, stream: Stream, record: &Value) -> LogResult<()> {
        if !record.is_object() {
            return Err(LogError::NotAnObject);
        }
        self.streams
            .lock()
            .unwrap()
            .entry(stream)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn scan(&self, stream: Stream) -> LogResult<Vec<Value>> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(&stream)
            .cloned()
            .unwrap_or_default())
    }
}
