//! Patch application.
//!
//! Application is strict about the shape of the value it edits: a patch
//! recorded against one value must not silently "succeed" against another.
//! `replace` and `remove` require their target to exist, `add` requires its
//! parent to exist, and array indices are bounds-checked.

use crate::error::{value_type_name, PatchError};
use crate::patch::{Patch, PatchOp, PathSegment};
use crate::result::PatchResult;
use serde_json::Value;
use std::borrow::Cow;

/// Apply a sequence of patches to a copy of `value` (pure function).
///
/// Either every patch applies and the new value is returned, or the first
/// failure is returned and `value` is untouched.
///
/// ```
/// use atelier_common::{apply_patches, path, Patch};
/// use serde_json::json;
///
/// let doc = json!({ "count": 0 });
/// let next = apply_patches(&doc, &[Patch::replace(path!["count"], json!(1))]).unwrap();
/// assert_eq!(next, json!({ "count": 1 }));
/// assert_eq!(doc, json!({ "count": 0 }));
/// ```
pub fn apply_patches(value: &Value, patches: &[Patch]) -> PatchResult<Value> {
    let mut result = value.clone();
    for patch in patches {
        apply_patch(&mut result, patch)?;
    }
    Ok(result)
}

/// Apply one patch in place.
///
/// Validation happens before the write, so a failed patch leaves `target`
/// as it was.
pub fn apply_patch(target: &mut Value, patch: &Patch) -> PatchResult<()> {
    match patch.op {
        PatchOp::Add => {
            let value = required_value(patch)?;
            apply_add(target, &patch.path, value)
        }
        PatchOp::Replace => {
            let value = required_value(patch)?;
            apply_replace(target, &patch.path, value)
        }
        PatchOp::Remove => apply_remove(target, &patch.path),
    }
}

fn required_value(patch: &Patch) -> PatchResult<Value> {
    patch.value.clone().ok_or_else(|| PatchError::MissingValue {
        path: crate::patch::display_path(&patch.path),
        op: patch.op.as_str(),
    })
}

fn apply_add(target: &mut Value, path: &[PathSegment], value: Value) -> PatchResult<()> {
    let Some((last, parent_path)) = path.split_last() else {
        *target = value;
        return Ok(());
    };

    match resolve_mut(target, parent_path, path)? {
        Value::Object(map) => {
            map.insert(key_of(last).into_owned(), value);
            Ok(())
        }
        Value::Array(arr) => {
            let index = index_of(last, path)?;
            if index > arr.len() {
                return Err(PatchError::index_out_of_bounds(path, index, arr.len()));
            }
            arr.insert(index, value);
            Ok(())
        }
        other => Err(PatchError::type_mismatch(
            path,
            "object or array",
            value_type_name(other),
        )),
    }
}

fn apply_replace(target: &mut Value, path: &[PathSegment], value: Value) -> PatchResult<()> {
    let Some((last, parent_path)) = path.split_last() else {
        *target = value;
        return Ok(());
    };

    match resolve_mut(target, parent_path, path)? {
        Value::Object(map) => match map.get_mut(key_of(last).as_ref()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PatchError::path_not_found(path)),
        },
        Value::Array(arr) => {
            let index = index_of(last, path)?;
            let len = arr.len();
            match arr.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(PatchError::index_out_of_bounds(path, index, len)),
            }
        }
        other => Err(PatchError::type_mismatch(
            path,
            "object or array",
            value_type_name(other),
        )),
    }
}

fn apply_remove(target: &mut Value, path: &[PathSegment]) -> PatchResult<()> {
    let Some((last, parent_path)) = path.split_last() else {
        return Err(PatchError::RemoveRoot);
    };

    match resolve_mut(target, parent_path, path)? {
        Value::Object(map) => map
            .remove(key_of(last).as_ref())
            .map(|_| ())
            .ok_or_else(|| PatchError::path_not_found(path)),
        Value::Array(arr) => {
            let index = index_of(last, path)?;
            if index >= arr.len() {
                return Err(PatchError::index_out_of_bounds(path, index, arr.len()));
            }
            arr.remove(index);
            Ok(())
        }
        other => Err(PatchError::type_mismatch(
            path,
            "object or array",
            value_type_name(other),
        )),
    }
}

/// Walk `segments` down from `root`, failing if any step is missing.
fn resolve_mut<'a>(
    root: &'a mut Value,
    segments: &[PathSegment],
    full_path: &[PathSegment],
) -> PatchResult<&'a mut Value> {
    let mut current = root;
    for seg in segments {
        current = match current {
            Value::Object(map) => map
                .get_mut(key_of(seg).as_ref())
                .ok_or_else(|| PatchError::parent_not_found(full_path))?,
            Value::Array(arr) => {
                let index = index_of(seg, full_path)?;
                let len = arr.len();
                arr.get_mut(index)
                    .ok_or_else(|| PatchError::index_out_of_bounds(full_path, index, len))?
            }
            _ => return Err(PatchError::parent_not_found(full_path)),
        };
    }
    Ok(current)
}

/// Object keys may arrive as numbers from loosely typed clients.
fn key_of(seg: &PathSegment) -> Cow<'_, str> {
    match seg {
        PathSegment::Key(k) => Cow::Borrowed(k.as_str()),
        PathSegment::Index(i) => Cow::Owned(i.to_string()),
    }
}

fn index_of(seg: &PathSegment, full_path: &[PathSegment]) -> PatchResult<usize> {
    match seg {
        PathSegment::Index(i) => Ok(*i),
        PathSegment::Key(k) => k
            .parse::<usize>()
            .map_err(|_| PatchError::type_mismatch(full_path, "array index", "string key")),
    }
}
