use crate::patch::{display_path, PathSegment};
use thiserror::Error;

/// Errors raised while applying a patch to a JSON value
///
/// Every variant carries the rendered path of the offending patch so the
/// caller can tell which edit went stale.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Parent of {path} is missing or not a container")]
    ParentNotFound { path: String },

    #[error("Index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Patch {op} at {path} requires a value")]
    MissingValue { path: String, op: &'static str },

    #[error("Cannot remove the root value")]
    RemoveRoot,
}

impl PatchError {
    pub fn path_not_found(path: &[PathSegment]) -> Self {
        PatchError::PathNotFound {
            path: display_path(path),
        }
    }

    pub fn parent_not_found(path: &[PathSegment]) -> Self {
        PatchError::ParentNotFound {
            path: display_path(path),
        }
    }

    pub fn index_out_of_bounds(path: &[PathSegment], index: usize, len: usize) -> Self {
        PatchError::IndexOutOfBounds {
            path: display_path(path),
            index,
            len,
        }
    }

    pub fn type_mismatch(path: &[PathSegment], expected: &'static str, found: &'static str) -> Self {
        PatchError::TypeMismatch {
            path: display_path(path),
            expected,
            found,
        }
    }
}

/// Short JSON type name used in error messages
pub fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
