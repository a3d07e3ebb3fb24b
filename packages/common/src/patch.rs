//! # Patches
//!
//! A patch is a single structural edit against a JSON value: an operation
//! (`add`, `replace`, `remove`), a path of object keys and array indices,
//! and for `add`/`replace` the value to write.
//!
//! Patches only make sense relative to the exact value they were recorded
//! against, and must be applied in recorded order.
//!
//! ## Wire shape
//!
//! ```json
//! { "op": "replace", "path": ["instances", 0, "label"], "value": "Hero" }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// One step into a JSON value
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array index
    Index(usize),
    /// Object key
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "/{}", k),
            PathSegment::Index(i) => write!(f, "/{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Render a path as a JSON-pointer-like string (`/` for the root)
pub fn display_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.iter().map(|seg| seg.to_string()).collect()
}

/// Patch operation kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }
}

/// A single structural edit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,

    pub path: Vec<PathSegment>,

    /// Present for `add` and `replace`. An explicit JSON `null` is kept as
    /// `Some(Value::Null)` so it survives a round trip.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub value: Option<Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Patch {
    pub fn add(path: Vec<PathSegment>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path,
            value: Some(value),
        }
    }

    pub fn replace(path: Vec<PathSegment>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path,
            value: Some(value),
        }
    }

    pub fn remove(path: Vec<PathSegment>) -> Self {
        Self {
            op: PatchOp::Remove,
            path,
            value: None,
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), display_path(&self.path))
    }
}

/// Build a patch path from a mix of keys and indices
///
/// ```
/// use atelier_common::{path, PathSegment};
///
/// let p = path!["pages", 0usize, "name"];
/// assert_eq!(p[1], PathSegment::Index(0));
/// ```
#[macro_export]
macro_rules! path {
    () => { ::std::vec::Vec::<$crate::PathSegment>::new() };
    ($($seg:expr),+ $(,)?) => {
        vec![$($crate::PathSegment::from($seg)),+]
    };
}
