//! # Undo/Redo Stack
//!
//! Transaction history for the editor.
//!
//! ## Design
//!
//! - Recording a transaction applies its forward patches and queues them
//! - Undo applies the reverse patches, moves the transaction to the redo
//!   stack and queues the reverse patches, so the server sees a rollback
//! - Redo reapplies the forward patches and queues them again
//! - Recording a new transaction clears the redo stack; undo/redo don't
//! - The undo stack is bounded; the oldest transaction is evicted first
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut stack = UndoStack::new();
//!
//! stack.record(transaction, &mut containers, &mut queue)?;
//! stack.undo(&mut containers, &mut queue)?;
//! stack.redo(&mut containers, &mut queue)?;
//! ```

use crate::container::ContainerRegistry;
use crate::sync_queue::SyncQueue;
use crate::transaction::{Transaction, TransactionId};
use crate::EditorError;
use std::collections::VecDeque;

/// Default number of undo levels
pub const DEFAULT_MAX_LEVELS: usize = 100;

/// Undo/redo stack of transactions
#[derive(Debug)]
pub struct UndoStack {
    /// Applied transactions (most recent last)
    undo_stack: VecDeque<Transaction>,

    /// Undone transactions (most recent last)
    redo_stack: Vec<Transaction>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl UndoStack {
    /// Create an undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(DEFAULT_MAX_LEVELS)
    }

    /// Create an undo stack with custom max levels
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Apply a new transaction, record it for undo and queue it for sync
    pub fn record(
        &mut self,
        transaction: Transaction,
        containers: &mut ContainerRegistry,
        queue: &mut SyncQueue,
    ) -> Result<(), EditorError> {
        containers.apply_changes(transaction.forward_patches())?;
        queue.enqueue(transaction.id.clone(), transaction.forward_changes());

        tracing::debug!(
            transaction_id = %transaction.id,
            containers = transaction.changes.len(),
            "recorded transaction"
        );

        self.undo_stack.push_back(transaction);

        // Trim if exceeded max levels
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::trace!(transaction_id = %evicted.id, "evicted oldest undo level");
            }
        }

        // New edit invalidates the redo future
        self.redo_stack.clear();

        Ok(())
    }

    /// Undo the most recent transaction.
    ///
    /// Returns `Ok(None)` when there is nothing to undo. If the reverse
    /// patches no longer fit the containers the transaction stays on the
    /// undo stack and nothing changes.
    pub fn undo(
        &mut self,
        containers: &mut ContainerRegistry,
        queue: &mut SyncQueue,
    ) -> Result<Option<TransactionId>, EditorError> {
        let Some(transaction) = self.undo_stack.pop_back() else {
            return Ok(None);
        };

        if let Err(err) = containers.apply_changes(transaction.reverse_patches()) {
            self.undo_stack.push_back(transaction);
            return Err(err);
        }
        queue.enqueue(transaction.id.clone(), transaction.reverse_changes());

        tracing::debug!(transaction_id = %transaction.id, "undid transaction");

        let id = transaction.id.clone();
        self.redo_stack.push(transaction);
        Ok(Some(id))
    }

    /// Redo the most recently undone transaction
    pub fn redo(
        &mut self,
        containers: &mut ContainerRegistry,
        queue: &mut SyncQueue,
    ) -> Result<Option<TransactionId>, EditorError> {
        let Some(transaction) = self.redo_stack.pop() else {
            return Ok(None);
        };

        if let Err(err) = containers.apply_changes(transaction.forward_patches()) {
            self.redo_stack.push(transaction);
            return Err(err);
        }
        queue.enqueue(transaction.id.clone(), transaction.forward_changes());

        tracing::debug!(transaction_id = %transaction.id, "redid transaction");

        let id = transaction.id.clone();
        self.undo_stack.push_back(transaction);
        Ok(Some(id))
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .back()
            .and_then(|transaction| transaction.description.as_deref())
    }

    /// Description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|transaction| transaction.description.as_deref())
    }

    /// Id of the transaction the next undo would revert
    pub fn peek_undo(&self) -> Option<&TransactionId> {
        self.undo_stack.back().map(|transaction| &transaction.id)
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::ContainerChange;
    use atelier_common::{path, Patch};
    use serde_json::{json, Value};

    fn setup() -> (ContainerRegistry, SyncQueue) {
        let mut containers = ContainerRegistry::new();
        containers.register("props", json!({ "label": "v0" })).unwrap();
        (containers, SyncQueue::new())
    }

    fn set_label(from: &str, to: &str) -> Transaction {
        Transaction::new(vec![ContainerChange {
            namespace: "props".to_string(),
            forward: vec![Patch::replace(path!["label"], json!(to))],
            reverse: vec![Patch::replace(path!["label"], json!(from))],
        }])
    }

    fn label(containers: &ContainerRegistry) -> Value {
        containers.value("props").unwrap()["label"].clone()
    }

    #[test]
    fn test_undo_stack_creation() {
        let stack = UndoStack::new();
        assert_eq!(stack.undo_levels(), 0);
        assert_eq!(stack.redo_levels(), 0);
        assert_eq!(stack.max_levels(), 100);
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_record_undo_redo() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::new();

        stack.record(set_label("v0", "v1"), &mut containers, &mut queue).unwrap();
        assert_eq!(label(&containers), json!("v1"));
        assert_eq!(stack.undo_levels(), 1);

        let undone = stack.undo(&mut containers, &mut queue).unwrap();
        assert!(undone.is_some());
        assert_eq!(label(&containers), json!("v0"));
        assert_eq!(stack.undo_levels(), 0);
        assert_eq!(stack.redo_levels(), 1);

        let redone = stack.redo(&mut containers, &mut queue).unwrap();
        assert_eq!(redone, undone);
        assert_eq!(label(&containers), json!("v1"));
        assert_eq!(stack.undo_levels(), 1);
        assert_eq!(stack.redo_levels(), 0);
    }

    #[test]
    fn test_undo_and_redo_on_empty_stacks_are_noops() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::new();

        assert_eq!(stack.undo(&mut containers, &mut queue).unwrap(), None);
        assert_eq!(stack.redo(&mut containers, &mut queue).unwrap(), None);
        assert!(queue.is_empty());
        assert_eq!(label(&containers), json!("v0"));
    }

    #[test]
    fn test_new_transaction_clears_redo() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::new();

        stack.record(set_label("v0", "v1"), &mut containers, &mut queue).unwrap();
        stack.undo(&mut containers, &mut queue).unwrap();
        assert_eq!(stack.redo_levels(), 1);

        stack.record(set_label("v0", "v2"), &mut containers, &mut queue).unwrap();
        assert_eq!(stack.redo_levels(), 0);
        assert_eq!(stack.redo(&mut containers, &mut queue).unwrap(), None);
        assert_eq!(label(&containers), json!("v2"));
    }

    #[test]
    fn test_max_levels_enforced() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::with_max_levels(2);

        for i in 0..3 {
            let transaction = set_label(&format!("v{}", i), &format!("v{}", i + 1));
            stack.record(transaction, &mut containers, &mut queue).unwrap();
        }

        assert_eq!(stack.undo_levels(), 2);
        stack.undo(&mut containers, &mut queue).unwrap();
        stack.undo(&mut containers, &mut queue).unwrap();
        assert_eq!(stack.undo(&mut containers, &mut queue).unwrap(), None);
        assert_eq!(label(&containers), json!("v1"));
    }

    #[test]
    fn test_undo_queues_reverse_patches() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::new();

        stack.record(set_label("v0", "v1"), &mut containers, &mut queue).unwrap();
        let sent = queue.flush();
        assert_eq!(sent[0].changes[0].patches[0].value, Some(json!("v1")));

        stack.undo(&mut containers, &mut queue).unwrap();
        let entries = queue.flush();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_id, sent[0].transaction_id);
        assert_eq!(entries[0].changes[0].patches[0].value, Some(json!("v0")));
    }

    #[test]
    fn test_stale_undo_surfaces_and_keeps_history() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::new();

        let broken = Transaction::new(vec![ContainerChange {
            namespace: "props".to_string(),
            forward: vec![Patch::add(path!["extra"], json!(1))],
            reverse: vec![Patch::remove(path!["missing"])],
        }]);
        stack.record(broken, &mut containers, &mut queue).unwrap();
        queue.flush();

        let err = stack.undo(&mut containers, &mut queue).unwrap_err();
        assert!(matches!(err, EditorError::Patch { .. }));
        assert_eq!(stack.undo_levels(), 1);
        assert_eq!(stack.redo_levels(), 0);
        assert!(queue.is_empty());
        assert_eq!(containers.value("props"), Some(&json!({ "label": "v0", "extra": 1 })));
    }

    #[test]
    fn test_descriptions() {
        let (mut containers, mut queue) = setup();
        let mut stack = UndoStack::new();

        stack
            .record(
                set_label("v0", "v1").with_description("Rename label"),
                &mut containers,
                &mut queue,
            )
            .unwrap();
        assert_eq!(stack.undo_description(), Some("Rename label"));
        assert_eq!(stack.redo_description(), None);

        stack.undo(&mut containers, &mut queue).unwrap();
        assert_eq!(stack.undo_description(), None);
        assert_eq!(stack.redo_description(), Some("Rename label"));
    }
}
