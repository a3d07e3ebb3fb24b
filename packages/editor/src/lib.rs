//! # Atelier Editor
//!
//! Optimistic client-side state engine for Atelier builds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ mutation callback: edits drafts             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ engine: one logical edit = one transaction  │
//! │  - Diff drafts into forward/reverse patches │
//! │  - Apply to containers, notify subscribers  │
//! │  - Record for undo/redo                     │
//! │  - Queue for sync (cancel on re-enqueue)    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ client: batch flush to the server of record │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Local first**: edits apply immediately, the network catches up
//! 2. **Patches are the only way in**: containers have no setter
//! 3. **All or nothing**: a transaction touches every container or none
//! 4. **Server authority**: on conflict the client reloads, it never merges
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atelier_editor::{EditorError, SyncClient, SyncClientConfig, SyncEngine};
//!
//! let mut engine = SyncEngine::new();
//! engine.register("instances", json!({}))?;
//! engine.register("props", json!({}))?;
//!
//! engine.run_transaction::<_, EditorError>(&["instances", "props"], |drafts| {
//!     drafts[0]["box"] = json!({ "component": "Box" });
//!     drafts[1]["box:label"] = json!({ "value": "Hero" });
//!     Ok(())
//! })?;
//!
//! let engine = Mutex::new(engine);
//! let client = SyncClient::new(transport, SyncClientConfig::new("build", "project", 0));
//! client.flush(&engine).await?;
//! ```

mod client;
mod container;
mod draft;
mod engine;
mod errors;
mod sync_queue;
mod transaction;
mod undo_stack;

#[cfg(feature = "http")]
mod http;

pub use client::{
    FlushOutcome, SyncClient, SyncClientConfig, SyncError, SyncStatus, Transport, TransportError,
};
pub use container::{ContainerRegistry, Subscriber, SubscriptionId, VersionedContainer};
pub use engine::{SyncEngine, TransactionResult};
pub use errors::EditorError;
pub use sync_queue::{QueueAction, QueueEntry, SyncQueue};
pub use transaction::{ContainerChange, Transaction, TransactionId};
pub use undo_stack::{UndoStack, DEFAULT_MAX_LEVELS};

#[cfg(feature = "http")]
pub use http::HttpTransport;

// Re-export common types for convenience
pub use atelier_common::{BuildSnapshot, Change, Patch, PatchOp, PathSegment, SyncRequest, SyncResponse};
