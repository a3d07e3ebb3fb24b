//! # Atelier Workspace
//!
//! Server of record for Atelier builds: validates and applies client
//! transaction batches under optimistic concurrency, and serves the
//! authoritative state for hard refreshes.

pub mod config;
pub mod error;
pub mod namespaces;
pub mod reconciler;
pub mod server;
pub mod state;
pub mod store;

pub use config::{ServerConfig, DEFAULT_CONFIG_NAME};
pub use error::{ReconcileError, StoreError};
pub use namespaces::{
    AssetsApplier, JsonApplier, NamespaceApplier, NamespaceRegistry, ASSETS_NAMESPACE,
    GENERIC_NAMESPACES,
};
pub use reconciler::Reconciler;
pub use server::{router, CreateBuildRequest};
pub use state::BuildState;
pub use store::{BuildStore, FileStore, MemoryStore, StoreResult};
