//! # Versioned Containers
//!
//! A container holds one named slice of shared application state (a map,
//! list or record) and notifies subscribers when it changes.
//!
//! Containers have no public setter. Their values only move when patches
//! produced by a transaction are applied, so every change is paired with a
//! patch that can be synced and reversed.

use crate::EditorError;
use atelier_common::{apply_patches, Patch};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Change callback, invoked with the namespace and its new value
pub type Subscriber = Box<dyn Fn(&str, &Value) + Send + Sync>;

/// Handle returned by [`ContainerRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// One named, structured value
pub struct VersionedContainer {
    namespace: String,
    value: Value,
    /// Local revision, bumped on every committed change
    revision: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl VersionedContainer {
    fn new(namespace: String, value: Value) -> Self {
        Self {
            namespace,
            value,
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Deserialize the current value into a typed view
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T, EditorError> {
        serde_json::from_value(self.value.clone()).map_err(|source| EditorError::Deserialize {
            namespace: self.namespace.clone(),
            source,
        })
    }

    fn commit(&mut self, value: Value) {
        self.value = value;
        self.revision += 1;
    }

    fn notify(&self) {
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.namespace, &self.value);
        }
    }
}

impl std::fmt::Debug for VersionedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedContainer")
            .field("namespace", &self.namespace)
            .field("revision", &self.revision)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Namespace → container map owned by one engine
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: BTreeMap<String, VersionedContainer>,
    next_subscription: u64,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container. Each namespace may be registered once.
    pub fn register(&mut self, namespace: impl Into<String>, initial: Value) -> Result<(), EditorError> {
        let namespace = namespace.into();
        if self.containers.contains_key(&namespace) {
            return Err(EditorError::DuplicateNamespace(namespace));
        }
        self.containers
            .insert(namespace.clone(), VersionedContainer::new(namespace, initial));
        Ok(())
    }

    pub fn get(&self, namespace: &str) -> Option<&VersionedContainer> {
        self.containers.get(namespace)
    }

    /// Like [`get`](Self::get) but unknown namespaces are an error
    pub fn require(&self, namespace: &str) -> Result<&VersionedContainer, EditorError> {
        self.containers
            .get(namespace)
            .ok_or_else(|| EditorError::UnregisteredContainer(namespace.to_string()))
    }

    pub fn value(&self, namespace: &str) -> Option<&Value> {
        self.get(namespace).map(VersionedContainer::value)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.containers.contains_key(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn subscribe<F>(&mut self, namespace: &str, subscriber: F) -> Result<SubscriptionId, EditorError>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        let container = self
            .containers
            .get_mut(namespace)
            .ok_or_else(|| EditorError::UnregisteredContainer(namespace.to_string()))?;
        container.subscribers.push((id, Box::new(subscriber)));
        self.next_subscription += 1;
        Ok(id)
    }

    /// Returns false if the subscription was not found
    pub fn unsubscribe(&mut self, namespace: &str, id: SubscriptionId) -> bool {
        let Some(container) = self.containers.get_mut(namespace) else {
            return false;
        };
        let before = container.subscribers.len();
        container.subscribers.retain(|(sub_id, _)| *sub_id != id);
        container.subscribers.len() != before
    }

    /// Apply per-namespace patch sets atomically.
    ///
    /// Every new value is computed first; containers are only written once
    /// all of them succeeded, and subscribers are only notified after every
    /// container has its new value.
    pub(crate) fn apply_changes<'a, I>(&mut self, changes: I) -> Result<(), EditorError>
    where
        I: IntoIterator<Item = (&'a str, &'a [Patch])>,
    {
        let mut staged = Vec::new();
        for (namespace, patches) in changes {
            let container = self.require(namespace)?;
            let next = apply_patches(container.value(), patches).map_err(|source| {
                EditorError::Patch {
                    namespace: namespace.to_string(),
                    source,
                }
            })?;
            staged.push((namespace, next));
        }

        for (namespace, value) in &mut staged {
            if let Some(container) = self.containers.get_mut(*namespace) {
                container.commit(std::mem::take(value));
            }
        }

        for (namespace, _) in &staged {
            if let Some(container) = self.containers.get(*namespace) {
                container.notify();
            }
        }

        Ok(())
    }

    /// Replace container values wholesale from authoritative state.
    ///
    /// Only used for a hard refresh. A namespace missing from `values` has
    /// never been written on the server and resets to `{}`.
    pub(crate) fn reset(&mut self, values: &BTreeMap<String, Value>) {
        let mut changed = Vec::new();
        for (namespace, container) in &mut self.containers {
            let value = values
                .get(namespace)
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            if container.value != value {
                changed.push(namespace.clone());
            }
            container.commit(value);
        }

        for namespace in changed {
            if let Some(container) = self.containers.get(&namespace) {
                container.notify();
            }
        }
    }
}
