//! Error types for the workspace server

use atelier_common::PatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Build already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reasons a batch is refused. Each maps to a `{ "errors": ... }` response.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Transaction batch is empty")]
    EmptyBatch,

    #[error("Transaction id is empty")]
    EmptyTransactionId,

    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("Build not found: {0}")]
    UnknownBuild(String),

    #[error("Build {build_id} does not belong to project {project_id}")]
    ProjectMismatch { build_id: String, project_id: String },

    #[error("Patch failed on {namespace}: {source}")]
    Patch {
        namespace: String,
        #[source]
        source: PatchError,
    },

    #[error("Invalid asset {key}: {reason}")]
    InvalidAsset { key: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
