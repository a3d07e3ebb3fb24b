//! # Sync Engine
//!
//! One editing session's state: the container registry, the transaction
//! history and the outbound sync queue.
//!
//! Everything here is synchronous and owned. There are no module-level
//! registries; two engines never share containers or queues, so tests and
//! independent sessions can run side by side. Hosts that flush from an
//! async task wrap the engine in `Arc<Mutex<SyncEngine>>` and never hold the
//! lock across an `.await` (see [`SyncClient`](crate::SyncClient)).

use crate::container::{ContainerRegistry, SubscriptionId};
use crate::draft;
use crate::sync_queue::{QueueEntry, SyncQueue};
use crate::transaction::TransactionId;
use crate::undo_stack::UndoStack;
use crate::EditorError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of [`SyncEngine::run_transaction`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    /// Id of the recorded transaction, `None` if the mutation changed nothing
    pub transaction_id: Option<TransactionId>,

    /// New container values, in the order the namespaces were listed
    pub values: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct SyncEngine {
    containers: ContainerRegistry,
    history: UndoStack,
    queue: SyncQueue,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a custom undo capacity (0 = unlimited)
    pub fn with_history_capacity(max_levels: usize) -> Self {
        Self {
            history: UndoStack::with_max_levels(max_levels),
            ..Self::default()
        }
    }

    /// Register a container under `namespace`
    pub fn register(&mut self, namespace: impl Into<String>, initial: Value) -> Result<(), EditorError> {
        self.containers.register(namespace, initial)
    }

    pub fn containers(&self) -> &ContainerRegistry {
        &self.containers
    }

    pub fn value(&self, namespace: &str) -> Option<&Value> {
        self.containers.value(namespace)
    }

    /// Typed view of a container's current value
    pub fn get_as<T: DeserializeOwned>(&self, namespace: &str) -> Result<T, EditorError> {
        self.containers.require(namespace)?.get_as()
    }

    pub fn subscribe<F>(&mut self, namespace: &str, subscriber: F) -> Result<SubscriptionId, EditorError>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.containers.subscribe(namespace, subscriber)
    }

    pub fn unsubscribe(&mut self, namespace: &str, id: SubscriptionId) -> bool {
        self.containers.unsubscribe(namespace, id)
    }

    /// Run one logical edit across one or more containers.
    ///
    /// `mutate` gets a mutable draft of each listed container, in order, and
    /// runs exactly once. If it returns an error nothing changes. Otherwise
    /// the edit is recorded, applied (subscribers fire once every container
    /// is updated) and queued for sync.
    ///
    /// ```rust,ignore
    /// engine.run_transaction::<_, EditorError>(&["instances", "props"], |drafts| {
    ///     drafts[0]["box"]["label"] = json!("Hero");
    ///     drafts[1]["box:title"] = json!({ "value": "Welcome" });
    ///     Ok(())
    /// })?;
    /// ```
    pub fn run_transaction<F, E>(&mut self, namespaces: &[&str], mutate: F) -> Result<TransactionResult, E>
    where
        F: FnOnce(&mut [Value]) -> Result<(), E>,
        E: From<EditorError>,
    {
        self.run(namespaces, None, mutate)
    }

    /// [`run_transaction`](Self::run_transaction) with an undo menu label
    pub fn run_transaction_with_description<F, E>(
        &mut self,
        description: impl Into<String>,
        namespaces: &[&str],
        mutate: F,
    ) -> Result<TransactionResult, E>
    where
        F: FnOnce(&mut [Value]) -> Result<(), E>,
        E: From<EditorError>,
    {
        self.run(namespaces, Some(description.into()), mutate)
    }

    fn run<F, E>(
        &mut self,
        namespaces: &[&str],
        description: Option<String>,
        mutate: F,
    ) -> Result<TransactionResult, E>
    where
        F: FnOnce(&mut [Value]) -> Result<(), E>,
        E: From<EditorError>,
    {
        let drafted = draft::produce(&self.containers, namespaces, mutate)?;

        let Some(mut transaction) = drafted.transaction else {
            return Ok(TransactionResult {
                transaction_id: None,
                values: drafted.values,
            });
        };
        transaction.description = description;

        let id = transaction.id.clone();
        self.history
            .record(transaction, &mut self.containers, &mut self.queue)?;

        Ok(TransactionResult {
            transaction_id: Some(id),
            values: drafted.values,
        })
    }

    /// Undo the latest transaction; `Ok(None)` if there is none
    pub fn undo(&mut self) -> Result<Option<TransactionId>, EditorError> {
        self.history.undo(&mut self.containers, &mut self.queue)
    }

    /// Redo the latest undone transaction; `Ok(None)` if there is none
    pub fn redo(&mut self) -> Result<Option<TransactionId>, EditorError> {
        self.history.redo(&mut self.containers, &mut self.queue)
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Take everything queued for sync (see [`SyncQueue::flush`])
    pub fn take_pending(&mut self) -> Vec<QueueEntry> {
        self.queue.flush()
    }

    /// Hard refresh from authoritative state.
    ///
    /// Replaces every container value (registered namespaces absent from
    /// the snapshot become `{}`), drops all history and anything still
    /// queued. Used after a version conflict.
    pub fn reload(&mut self, namespaces: &BTreeMap<String, Value>) {
        for namespace in namespaces.keys() {
            if !self.containers.contains(namespace) {
                tracing::debug!(%namespace, "ignoring unregistered namespace in snapshot");
            }
        }

        self.containers.reset(namespaces);
        self.history.clear();
        self.queue.clear();
    }
}
