//! Generic fold from an event stream to one current-state value per key.

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::Value;

/// Folds every record through `combine` in scan order, grouped by `key_fn`.
/// A record whose key function returns `None` is excluded entirely; it is
/// never assigned to a default key. Keys keep first-seen order.
pub fn reduce<T, K, C>(
    records: impl IntoIterator<Item = T>,
    key_fn: K,
    combine: C,
) -> IndexMap<String, T>
where
    K: Fn(&T) -> Option<String>,
    C: Fn(&mut T, T),
{
    let mut out = IndexMap::new();
    for record in records {
        let Some(key) = key_fn(&record) else {
            continue;
        };
        match out.entry(key) {
            Entry::Occupied(mut entry) => combine(entry.get_mut(), record),
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }
    }
    out
}

/// Replace-latest combine rule: the incoming record replaces the existing
/// one when its `ts` is newer. Ties go to the incoming record, i.e. the one
/// later in the scan.
pub fn replace_if_newer(existing: &mut Value, incoming: Value) {
    if ts_of(&incoming) >= ts_of(existing) {
        *existing = incoming;
    }
}

/// Merge combine rule for cumulative documents: incoming fields win per
/// field, fields absent from the incoming record survive.
pub fn merge_fields(existing: &mut Value, incoming: Value) {
    match (existing.as_object_mut(), incoming) {
        (Some(base), Value::Object(update)) => {
            for (field, value) in update {
                base.insert(field, value);
            }
        }
        (_, incoming) => *existing = incoming,
    }
}

/// Replace-latest fold over raw records, optionally filtered by the `type`
/// tag, keyed by a string field.
pub fn reduce_latest(
    records: Vec<Value>,
    type_filter: Option<&str>,
    key_field: &str,
) -> IndexMap<String, Value> {
    let matching = records.into_iter().filter(|record| match type_filter {
        Some(tag) => record.get("type").and_then(Value::as_str) == Some(tag),
        None => true,
    });
    reduce(matching, |record| string_key(record, key_field), replace_if_newer)
}

pub fn ts_of(record: &Value) -> i64 {
    record.get("ts").and_then(Value::as_i64).unwrap_or(0)
}

pub fn string_key(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
