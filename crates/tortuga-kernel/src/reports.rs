use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use tortuga_core::now_epoch;
use tortuga_store::{DynEventLog, Stream};

use crate::error::KernelError;
use crate::reducer::reduce_latest;

const TYPE_FILES: &str = "files";

/// Per-device latest file-state report, replace-on-latest.
pub struct ReportStore {
    log: DynEventLog,
}

impl ReportStore {
    pub fn new(log: DynEventLog) -> Self {
        Self { log }
    }

    pub fn record_files(
        &self,
        turtle_id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<(), KernelError> {
        fields.insert("type".into(), json!(TYPE_FILES));
        fields.insert("ts".into(), json!(now_epoch()));
        fields.insert("turtle_id".into(), json!(turtle_id));
        self.log.append(Stream::Reports, &Value::Object(fields))?;
        Ok(())
    }

    pub fn latest(&self) -> Result<IndexMap<String, Value>, KernelError> {
        Ok(reduce_latest(
            self.log.scan(Stream::Reports)?,
            Some(TYPE_FILES),
            "turtle_id",
        ))
    }
}
