//! # Structural Diff
//!
//! Computes the patches that take one JSON value to another, together with
//! the inverse patches that take it back.
//!
//! ## Rules
//!
//! - Objects: removed keys become `remove`, new keys become `add`, shared
//!   keys are diffed recursively.
//! - Arrays: the shared prefix is diffed element by element, growth becomes
//!   `add` at ascending indices, shrinkage becomes `remove` at descending
//!   indices. Moving an element to the front is therefore a run of
//!   `replace`s rather than a single insert.
//! - Anything else that differs becomes a `replace` (at `[]` for the root).
//!
//! Each forward patch is paired with its inverse at the moment it is
//! emitted; the inverse list is reversed at the end, so applying
//! `reverse` to the new value reproduces the old one exactly.

use crate::patch::{Patch, PathSegment};
use serde_json::Value;

/// Forward and reverse patch sets for one value transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// Patches from old to new, in application order
    pub forward: Vec<Patch>,

    /// Patches from new back to old, in application order
    pub reverse: Vec<Patch>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Diff `old` against `new`
pub fn diff(old: &Value, new: &Value) -> Diff {
    let mut forward = Vec::new();
    let mut reverse = Vec::new();
    let mut path = Vec::new();

    diff_values(old, new, &mut path, &mut forward, &mut reverse);
    reverse.reverse();

    Diff { forward, reverse }
}

fn diff_values(
    old: &Value,
    new: &Value,
    path: &mut Vec<PathSegment>,
    forward: &mut Vec<Patch>,
    reverse: &mut Vec<Patch>,
) {
    if old == new {
        return;
    }

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_child) in old_map {
                path.push(PathSegment::Key(key.clone()));
                match new_map.get(key) {
                    Some(new_child) => diff_values(old_child, new_child, path, forward, reverse),
                    None => {
                        forward.push(Patch::remove(path.clone()));
                        reverse.push(Patch::add(path.clone(), old_child.clone()));
                    }
                }
                path.pop();
            }

            for (key, new_child) in new_map {
                if old_map.contains_key(key) {
                    continue;
                }
                path.push(PathSegment::Key(key.clone()));
                forward.push(Patch::add(path.clone(), new_child.clone()));
                reverse.push(Patch::remove(path.clone()));
                path.pop();
            }
        }

        (Value::Array(old_items), Value::Array(new_items)) => {
            let shared = old_items.len().min(new_items.len());
            for index in 0..shared {
                path.push(PathSegment::Index(index));
                diff_values(&old_items[index], &new_items[index], path, forward, reverse);
                path.pop();
            }

            for (index, item) in new_items.iter().enumerate().skip(shared) {
                path.push(PathSegment::Index(index));
                forward.push(Patch::add(path.clone(), item.clone()));
                reverse.push(Patch::remove(path.clone()));
                path.pop();
            }

            for index in (shared..old_items.len()).rev() {
                path.push(PathSegment::Index(index));
                forward.push(Patch::remove(path.clone()));
                reverse.push(Patch::add(path.clone(), old_items[index].clone()));
                path.pop();
            }
        }

        _ => {
            forward.push(Patch::replace(path.clone(), new.clone()));
            reverse.push(Patch::replace(path.clone(), old.clone()));
        }
    }
}
