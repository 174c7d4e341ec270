//! Canonical serialization and content hashing.
//!
//! `content_hash` must be stable across key reordering of a logically
//! identical payload, so we sort object keys recursively before hashing
//! rather than hashing the raw serializer output.

use serde::Serialize;
use serde_json::Value;

/// Recursively sort map keys so two structurally-equal values serialize
/// identically regardless of field insertion order.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    let raw = serde_json::to_value(value)?;
    Ok(sort_value(raw))
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// `blake3` hex digest of a value's canonical serialization.
///
/// Stable for logically-identical content, independent of storage location
/// (`content_inline` vs `content_location`).
pub fn content_hash<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let canonical = canonical_json(value)?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
