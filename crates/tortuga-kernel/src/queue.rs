use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use tortuga_core::{Job, JobState, now_epoch};
use tortuga_store::{DynEventLog, Stream};

use crate::error::KernelError;
use crate::reducer::reduce;

/// Job lifecycle over the jobs stream: `queued -> claimed -> <terminal>`.
/// There is no transition back to `queued`; a stuck claimed job requires
/// operator intervention.
pub struct JobQueue {
    log: DynEventLog,
    // Serializes the select-and-append sequence of `claim_next` so two
    // claimers can never both observe the same job as queued.
    claim_lock: Mutex<()>,
}

impl JobQueue {
    pub fn new(log: DynEventLog) -> Self {
        Self {
            log,
            claim_lock: Mutex::new(()),
        }
    }

    /// Appends a fresh queued job and returns the full record.
    pub fn create(&self, turtle_id: &str, cmd: String, args: Value) -> Result<Job, KernelError> {
        let job = Job {
            id: Uuid::new_v4().to_string(),
            ts: Some(now_epoch()),
            turtle_id: Some(turtle_id.to_string()),
            cmd: Some(cmd),
            args: Some(args),
            state: Some(JobState::Queued),
            claim_ts: None,
            done_ts: None,
            extra: Map::new(),
        };
        self.log.append(Stream::Jobs, &serde_json::to_value(&job)?)?;
        Ok(job)
    }

    /// Materializes every job id via the field-wise merge fold, in the order
    /// the ids first appeared in the stream.
    pub fn materialize(&self) -> Result<IndexMap<String, Job>, KernelError> {
        let events = self.log.scan(Stream::Jobs)?.into_iter().filter_map(|record| {
            match serde_json::from_value::<Job>(record) {
                Ok(event) => Some(event),
                Err(err) => {
                    // An event without an id (or with mistyped fields) never
                    // materializes into any visible job.
                    tracing::debug!(%err, "skipping malformed job event");
                    None
                }
            }
        });
        Ok(reduce(events, |event| Some(event.id.clone()), Job::merge))
    }

    pub fn list(&self) -> Result<Vec<Job>, KernelError> {
        Ok(self.materialize()?.into_values().collect())
    }

    /// Claims the oldest queued job for the device, if any. The claim is a
    /// conditional append: selection and the `claimed` transition happen
    /// under one lock, and the job was re-checked as still queued inside it,
    /// so concurrent claimers cannot both be handed the same job.
    pub fn claim_next(&self, turtle_id: &str) -> Result<Option<Job>, KernelError> {
        let _guard = self.claim_lock.lock().unwrap();
        let jobs = self.materialize()?;
        let mut candidate: Option<&Job> = None;
        for job in jobs.values() {
            if job.state != Some(JobState::Queued) || job.turtle_id.as_deref() != Some(turtle_id) {
                continue;
            }
            // Strictly smaller ts wins; ties keep the earliest-appended job.
            let better = match candidate {
                None => true,
                Some(best) => job.ts.unwrap_or(0) < best.ts.unwrap_or(0),
            };
            if better {
                candidate = Some(job);
            }
        }
        let Some(id) = candidate.map(|job| job.id.clone()) else {
            return Ok(None);
        };
        // Partial event: merge-fields semantics preserve cmd/args/turtle_id
        // from the creation event.
        self.log.append(
            Stream::Jobs,
            &json!({"id": id, "state": "claimed", "claim_ts": now_epoch()}),
        )?;
        Ok(self.materialize()?.shift_remove(&id))
    }

    /// Appends arbitrary progress fields into the job document. An unknown
    /// id is accepted and simply never materializes (orphan event). A truthy
    /// `final` field appends a second, terminal transition event; a crash
    /// between the two leaves the job merged-but-not-terminal, recoverable
    /// by a later correcting report.
    pub fn report_progress(&self, id: &str, fields: Map<String, Value>) -> Result<(), KernelError> {
        let finalize = fields.get("final").is_some_and(truthy);
        let status = fields
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("done")
            .to_string();
        let mut record = fields;
        record.insert("id".into(), json!(id));
        self.log.append(Stream::Jobs, &Value::Object(record))?;
        if finalize {
            self.log.append(
                Stream::Jobs,
                &json!({"id": id, "state": status, "done_ts": now_epoch()}),
            )?;
        }
        Ok(())
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
