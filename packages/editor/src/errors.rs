//! Error types for the editor

use atelier_common::PatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    /// A transaction referenced a namespace nobody registered. Patches for it
    /// could never be routed to the server, so this is a programming error.
    #[error("Container not registered: {0}")]
    UnregisteredContainer(String),

    #[error("Container already registered: {0}")]
    DuplicateNamespace(String),

    #[error("Container listed twice in one transaction: {0}")]
    DuplicateContainer(String),

    #[error("Patch failed on {namespace}: {source}")]
    Patch {
        namespace: String,
        #[source]
        source: PatchError,
    },

    #[error("Failed to read {namespace}: {source}")]
    Deserialize {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },
}
