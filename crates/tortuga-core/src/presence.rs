use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Derived (never stored) projection of a device's latest status, its alias
/// assignment, and the forget history into an online/offline summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub id: String,
    pub alias: Option<String>,
    pub label: Option<String>,
    pub role: Option<String>,
    pub version: Option<Value>,
    pub fuel: Option<Value>,
    pub pos: Option<Value>,
    pub programs: Vec<Value>,
    pub last_seen: i64,
    pub last_seen_secs: i64,
    pub online: bool,
}

impl Presence {
    /// Display name used for sorting: alias, else label, else id.
    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or(&self.id)
    }

    /// Sort key for device listings: online devices first, then by display
    /// name, lexicographic.
    pub fn sort_key(&self) -> (bool, &str) {
        (!self.online, self.display_name())
    }
}
