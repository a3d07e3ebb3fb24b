//! Transactions: atomic, undoable bundles of per-container patch sets.

use atelier_common::{Change, Patch};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique, client-generated transaction id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Forward and reverse patches for one container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerChange {
    pub namespace: String,
    pub forward: Vec<Patch>,
    pub reverse: Vec<Patch>,
}

/// One logical edit spanning one or more containers
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,

    /// Per-container patch sets, in the order the containers were listed
    pub changes: Vec<ContainerChange>,

    /// Optional label for undo/redo menus
    pub description: Option<String>,
}

impl Transaction {
    pub fn new(changes: Vec<ContainerChange>) -> Self {
        Self {
            id: TransactionId::new(),
            changes,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|change| change.namespace.as_str())
    }

    pub(crate) fn forward_patches(&self) -> impl Iterator<Item = (&str, &[Patch])> {
        self.changes
            .iter()
            .map(|change| (change.namespace.as_str(), change.forward.as_slice()))
    }

    pub(crate) fn reverse_patches(&self) -> impl Iterator<Item = (&str, &[Patch])> {
        self.changes
            .iter()
            .map(|change| (change.namespace.as_str(), change.reverse.as_slice()))
    }

    /// Wire changes that replay this transaction
    pub fn forward_changes(&self) -> Vec<Change> {
        self.changes
            .iter()
            .map(|change| Change {
                namespace: change.namespace.clone(),
                patches: change.forward.clone(),
            })
            .collect()
    }

    /// Wire changes that roll this transaction back
    pub fn reverse_changes(&self) -> Vec<Change> {
        self.changes
            .iter()
            .map(|change| Change {
                namespace: change.namespace.clone(),
                patches: change.reverse.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_common::path;
    use serde_json::json;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }

    #[test]
    fn test_wire_changes() {
        let transaction = Transaction::new(vec![ContainerChange {
            namespace: "props".to_string(),
            forward: vec![Patch::add(path!["p1"], json!({ "value": 1 }))],
            reverse: vec![Patch::remove(path!["p1"])],
        }])
        .with_description("Add prop");

        let forward = transaction.forward_changes();
        assert_eq!(forward[0].namespace, "props");
        assert_eq!(forward[0].patches, transaction.changes[0].forward);

        let reverse = transaction.reverse_changes();
        assert_eq!(reverse[0].patches, vec![Patch::remove(path!["p1"])]);
        assert_eq!(transaction.description.as_deref(), Some("Add prop"));
    }
}
