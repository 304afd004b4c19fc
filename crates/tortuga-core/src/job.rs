use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a job. Devices complete a job with an arbitrary status
/// string ("done", an error code, ...), so anything that is not `queued` or
/// `claimed` is a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Queued,
    Claimed,
    Terminal(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Terminal(_))
    }
}

impl From<String> for JobState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => JobState::Queued,
            "claimed" => JobState::Claimed,
            _ => JobState::Terminal(raw),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Queued => "queued".into(),
            JobState::Claimed => "claimed".into(),
            JobState::Terminal(status) => status,
        }
    }
}

/// A job document. The same type represents both a single job event (where
/// only `id` plus the transitioned fields are present) and the materialized
/// job (every event for the id merged in append order).
///
/// Devices attach arbitrary progress fields via reports; those land in
/// `extra` and survive merging like any declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turtle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_ts: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Job {
    /// Field-wise shallow merge: fields the incoming event specifies win,
    /// fields it omits persist. A job is a cumulative document, not a
    /// replace-latest snapshot.
    pub fn merge(&mut self, incoming: Job) {
        debug_assert_eq!(self.id, incoming.id);
        if incoming.ts.is_some() {
            self.ts = incoming.ts;
        }
        if incoming.turtle_id.is_some() {
            self.turtle_id = incoming.turtle_id;
        }
        if incoming.cmd.is_some() {
            self.cmd = incoming.cmd;
        }
        if incoming.args.is_some() {
            self.args = incoming.args;
        }
        if incoming.state.is_some() {
            self.state = incoming.state;
        }
        if incoming.claim_ts.is_some() {
            self.claim_ts = incoming.claim_ts;
        }
        if incoming.done_ts.is_some() {
            self.done_ts = incoming.done_ts;
        }
        self.extra.extend(incoming.extra);
    }
}
