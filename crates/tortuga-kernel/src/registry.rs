use serde_json::{Map, Value, json};

use tortuga_core::{Presence, now_epoch};
use tortuga_store::{DynEventLog, Stream};

use crate::error::KernelError;
use crate::reducer::{reduce_latest, ts_of};

/// A device is online while its latest status is younger than this.
pub const ONLINE_WINDOW_SECS: i64 = 30;

const TYPE_STATUS: &str = "status";
const TYPE_ALIAS: &str = "alias";
const TYPE_FORGET: &str = "forget";

/// Presence view over the status and device-admin streams.
pub struct DeviceRegistry {
    log: DynEventLog,
}

impl DeviceRegistry {
    pub fn new(log: DynEventLog) -> Self {
        Self { log }
    }

    /// Appends a status snapshot for the device. When the incoming fields
    /// omit `pos` but a prior status carried one, the last-known position is
    /// carried forward into the new event so the view never loses it.
    pub fn report_status(
        &self,
        turtle_id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<(), KernelError> {
        if !fields.contains_key("pos")
            && let Some(pos) = self.last_known_pos(turtle_id)?
        {
            fields.insert("pos".into(), pos);
        }
        fields.insert("type".into(), json!(TYPE_STATUS));
        fields.insert("ts".into(), json!(now_epoch()));
        fields.insert("turtle_id".into(), json!(turtle_id));
        self.log.append(Stream::Status, &Value::Object(fields))?;
        Ok(())
    }

    fn last_known_pos(&self, turtle_id: &str) -> Result<Option<Value>, KernelError> {
        let mut latest: Option<Value> = None;
        for record in self.log.scan(Stream::Status)? {
            if record.get("type").and_then(Value::as_str) != Some(TYPE_STATUS)
                || record.get("turtle_id").and_then(Value::as_str) != Some(turtle_id)
            {
                continue;
            }
            match &latest {
                Some(prev) if ts_of(&record) < ts_of(prev) => {}
                _ => latest = Some(record),
            }
        }
        Ok(latest
            .and_then(|record| record.get("pos").cloned())
            .filter(|pos| !pos.is_null()))
    }

    /// Records an alias assignment. An empty alias clears the display name
    /// without removing the device.
    pub fn set_alias(&self, turtle_id: &str, alias: &str) -> Result<String, KernelError> {
        let alias = alias.trim().to_string();
        let record = json!({
            "type": TYPE_ALIAS,
            "ts": now_epoch(),
            "turtle_id": turtle_id,
            "alias": alias,
        });
        self.log.append(Stream::Devices, &record)?;
        Ok(alias)
    }

    /// Appends a forget tombstone. Forgetting is itself an event; the full
    /// history stays in the log.
    pub fn forget(&self, turtle_id: &str) -> Result<(), KernelError> {
        let record = json!({
            "type": TYPE_FORGET,
            "ts": now_epoch(),
            "turtle_id": turtle_id,
        });
        self.log.append(Stream::Devices, &record)?;
        Ok(())
    }

    /// Folds status, alias, and forget history into the sorted presence view.
    /// A device with any forget tombstone is excluded regardless of how its
    /// timestamps compare to the status events.
    pub fn list_devices(&self, now: i64) -> Result<Vec<Presence>, KernelError> {
        let statuses = reduce_latest(self.log.scan(Stream::Status)?, Some(TYPE_STATUS), "turtle_id");
        let admin = self.log.scan(Stream::Devices)?;
        let aliases = reduce_latest(admin.clone(), Some(TYPE_ALIAS), "turtle_id");
        let forgotten = reduce_latest(admin, Some(TYPE_FORGET), "turtle_id");

        let mut devices = Vec::with_capacity(statuses.len());
        for (turtle_id, status) in statuses {
            if forgotten.contains_key(&turtle_id) {
                continue;
            }
            let alias = aliases
                .get(&turtle_id)
                .and_then(|record| record.get("alias"))
                .and_then(Value::as_str)
                .filter(|alias| !alias.is_empty())
                .map(str::to_string);
            let last_seen = ts_of(&status);
            devices.push(Presence {
                alias,
                label: field_str(&status, "label"),
                role: field_str(&status, "role"),
                version: field(&status, "version"),
                fuel: field(&status, "fuel"),
                pos: field(&status, "pos"),
                programs: status
                    .get("programs")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                last_seen,
                last_seen_secs: (now - last_seen).max(0),
                online: now - last_seen < ONLINE_WINDOW_SECS,
                id: turtle_id,
            });
        }
        devices.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(devices)
    }
}

fn field(record: &Value, name: &str) -> Option<Value> {
    record.get(name).cloned().filter(|value| !value.is_null())
}

fn field_str(record: &Value, name: &str) -> Option<String> {
    record.get(name).and_then(Value::as_str).map(str::to_string)
}
