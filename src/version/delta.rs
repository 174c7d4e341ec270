// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Structured, JSON-patch-style diffs over canonical content.
//!
//! Every function here is pure: no I/O, no locks, no global state. Diffs are
//! computed over `canonical_json` (recursively key-sorted) rather than raw
//! bytes, so a delta survives a schema-compatible key reordering between two
//! otherwise-identical payloads.

use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::util::canonical_json;

/// A single structured edit, addressed by a JSON-pointer-style path.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DeltaOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
}

/// An ordered list of edits. Empty means "no change".
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Delta {
    pub ops: Vec<DeltaOp>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Diff `old` against `new` over their canonical forms.
pub fn compute_delta<T: serde::Serialize>(old: &T, new: &T) -> Result<Delta> {
    let old = canonical_json(old).map_err(|e| StoreError::Other(format!("canonicalize failed: {e}")))?;
    let new = canonical_json(new).map_err(|e| StoreError::Other(format!("canonicalize failed: {e}")))?;
    Ok(compute_diff_between(&old, &new))
}

/// Same as `compute_delta` but over already-canonicalized `serde_json::Value`s.
pub fn compute_diff_between(old: &Value, new: &Value) -> Delta {
    let mut ops = Vec::new();
    diff_at("", old, new, &mut ops);
    Delta { ops }
}

fn diff_at(path: &str, old: &Value, new: &Value, ops: &mut Vec<DeltaOp>) {
    if old == new {
        return;
    }

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                let child_path = format!("{path}/{key}");
                match new_map.get(key) {
                    Some(new_value) => diff_at(&child_path, old_value, new_value, ops),
                    None => ops.push(DeltaOp::Remove { path: child_path }),
                }
            }
            for (key, new_value) in new_map {
                if !old_map.contains_key(key) {
                    ops.push(DeltaOp::Add {
                        path: format!("{path}/{key}"),
                        value: new_value.clone(),
                    });
                }
            }
        }
        _ => ops.push(DeltaOp::Replace {
            path: path.to_string(),
            value: new.clone(),
        }),
    }
}

/// Apply `delta` to `old`'s canonical form, producing `new`'s canonical form.
pub fn apply_delta<T>(old: &T, delta: &Delta) -> Result<Value>
where
    T: serde::Serialize,
{
    let mut value =
        canonical_json(old).map_err(|e| StoreError::Other(format!("canonicalize failed: {e}")))?;
    for op in &delta.ops {
        apply_op(&mut value, op)?;
    }
    Ok(value)
}

fn apply_op(root: &mut Value, op: &DeltaOp) -> Result<()> {
    let (path, action) = match op {
        DeltaOp::Add { path, value } => (path, Action::Set(value.clone())),
        DeltaOp::Replace { path, value } => (path, Action::Set(value.clone())),
        DeltaOp::Remove { path } => (path, Action::Remove),
    };

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        if let Action::Set(value) = action {
            *root = value;
            return Ok(());
        }
        return Err(StoreError::DeltaApplyFailure {
            resource_id: String::new(),
            version: String::new(),
            reason: "cannot remove root".to_string(),
        });
    }

    let mut node = root;
    for segment in &segments[..segments.len() - 1] {
        node = node
            .as_object_mut()
            .and_then(|obj| obj.get_mut(*segment))
            .ok_or_else(|| StoreError::DeltaApplyFailure {
                resource_id: String::new(),
                version: String::new(),
                reason: format!("path segment '{segment}' missing while applying delta"),
            })?;
    }

    let obj = node.as_object_mut().ok_or_else(|| StoreError::DeltaApplyFailure {
        resource_id: String::new(),
        version: String::new(),
        reason: "expected object at delta target path".to_string(),
    })?;

    let last = segments[segments.len() - 1];
    match action {
        Action::Set(value) => {
            obj.insert(last.to_string(), value);
        }
        Action::Remove => {
            obj.remove(last);
        }
    }
    Ok(())
}

enum Action {
    Set(Value),
    Remove,
}

/// Reconstruct content by applying a chain of deltas, oldest-first, onto a
/// base snapshot.
pub fn reconstruct_version(base: Value, diffs: &[Delta]) -> Result<Value> {
    let mut value = base;
    for delta in diffs {
        for op in &delta.ops {
            apply_op(&mut value, op)?;
        }
    }
    Ok(value)
}

/// Positions `0, interval, 2*interval, ...` are forced snapshots; everything
/// else is a delta candidate unless `force` overrides it.
pub fn should_keep_as_snapshot(position: usize, interval: usize, force: bool) -> bool {
    force || interval == 0 || position % interval == 0
}
