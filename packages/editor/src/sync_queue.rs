//! # Outbound Sync Queue
//!
//! Pending transactions waiting to be sent to the server.
//!
//! ## Cancel on re-enqueue
//!
//! At most one entry per transaction id is ever queued. Enqueueing an id
//! that is already queued removes the queued entry instead of adding a new
//! one: an undo of a not-yet-sent transaction (or a redo of a not-yet-sent
//! undo) cancels out, and the net-zero pair never reaches the network.
//! Each call toggles presence, so undo → redo → undo before a flush leaves
//! exactly the undo queued.

use crate::transaction::TransactionId;
use atelier_common::{Change, SyncTransaction};

/// One queued transaction
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub transaction_id: TransactionId,

    /// Forward or reverse patches, depending on why it was queued
    pub changes: Vec<Change>,
}

impl QueueEntry {
    pub fn to_wire(&self) -> SyncTransaction {
        SyncTransaction {
            transaction_id: self.transaction_id.to_string(),
            changes: self.changes.clone(),
        }
    }
}

/// What [`SyncQueue::enqueue`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Queued,
    /// An entry with the same id was already queued and has been dropped
    Cancelled,
}

#[derive(Debug, Default)]
pub struct SyncQueue {
    entries: Vec<QueueEntry>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, transaction_id: TransactionId, changes: Vec<Change>) -> QueueAction {
        if let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.transaction_id == transaction_id)
        {
            self.entries.remove(position);
            tracing::trace!(%transaction_id, "cancelled queued transaction");
            return QueueAction::Cancelled;
        }

        self.entries.push(QueueEntry {
            transaction_id,
            changes,
        });
        QueueAction::Queued
    }

    /// Take every queued entry in enqueue order, leaving the queue empty.
    ///
    /// Anything enqueued afterwards lands in a fresh generation and is
    /// picked up by the next flush.
    pub fn flush(&mut self) -> Vec<QueueEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn contains(&self, transaction_id: &TransactionId) -> bool {
        self.entries
            .iter()
            .any(|entry| &entry.transaction_id == transaction_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
