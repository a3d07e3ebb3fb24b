//! Shared building blocks for Atelier's sync engine.
//!
//! Both the editor (client) and the workspace server (reconciler) speak in
//! terms of JSON patches against per-namespace state. This crate holds the
//! patch model, the structural diff that produces patches, the validating
//! patch applier, and the wire types exchanged on every flush.

pub mod apply;
pub mod diff;
pub mod error;
pub mod patch;
pub mod result;
pub mod wire;

pub use apply::{apply_patch, apply_patches};
pub use diff::{diff, Diff};
pub use error::*;
pub use patch::{Patch, PatchOp, PathSegment};
pub use result::*;
pub use wire::{BuildSnapshot, Change, SyncRequest, SyncResponse, SyncTransaction};
