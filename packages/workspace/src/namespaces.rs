//! # Namespace Allow-List
//!
//! The server only accepts patches for namespaces it knows. Most are plain
//! JSON documents patched as-is; some have a dedicated applier that
//! validates the result before it can be committed.

use crate::error::ReconcileError;
use atelier_common::{apply_patches, Patch};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Namespaces stored as plain JSON documents
pub const GENERIC_NAMESPACES: &[&str] = &[
    "pages",
    "instances",
    "props",
    "breakpoints",
    "styles",
    "styleSources",
    "styleSourceSelections",
    "dataSources",
    "resources",
    "marketplaceProduct",
];

pub const ASSETS_NAMESPACE: &str = "assets";

/// Applies one namespace's patches to its current value
pub trait NamespaceApplier: Send + Sync {
    fn apply(&self, namespace: &str, current: &Value, patches: &[Patch]) -> Result<Value, ReconcileError>;
}

/// Patches the stored JSON as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonApplier;

impl NamespaceApplier for JsonApplier {
    fn apply(&self, namespace: &str, current: &Value, patches: &[Patch]) -> Result<Value, ReconcileError> {
        apply_patches(current, patches).map_err(|source| ReconcileError::Patch {
            namespace: namespace.to_string(),
            source,
        })
    }
}

/// Asset map keyed by asset id.
///
/// After patching, the namespace must still be an object and every entry
/// an object whose `id` matches its key.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetsApplier;

impl NamespaceApplier for AssetsApplier {
    fn apply(&self, namespace: &str, current: &Value, patches: &[Patch]) -> Result<Value, ReconcileError> {
        let next = JsonApplier.apply(namespace, current, patches)?;

        let Some(assets) = next.as_object() else {
            return Err(ReconcileError::InvalidAsset {
                key: String::new(),
                reason: "asset map must be an object".to_string(),
            });
        };

        for (key, asset) in assets {
            let id = asset.get("id").and_then(Value::as_str);
            if id != Some(key.as_str()) {
                return Err(ReconcileError::InvalidAsset {
                    key: key.clone(),
                    reason: match id {
                        Some(id) => format!("id {} does not match key", id),
                        None => "missing string id".to_string(),
                    },
                });
            }
        }

        Ok(next)
    }
}

/// Allow-listed namespaces and how each is applied
#[derive(Clone)]
pub struct NamespaceRegistry {
    appliers: BTreeMap<String, Arc<dyn NamespaceApplier>>,
}

impl NamespaceRegistry {
    /// An empty allow-list
    pub fn empty() -> Self {
        Self {
            appliers: BTreeMap::new(),
        }
    }

    /// `generic` as plain JSON namespaces plus `assets`
    pub fn with_generic<I, S>(generic: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::empty();
        for namespace in generic {
            registry.register(namespace, JsonApplier);
        }
        registry.register(ASSETS_NAMESPACE, AssetsApplier);
        registry
    }

    pub fn register(&mut self, namespace: impl Into<String>, applier: impl NamespaceApplier + 'static) {
        self.appliers.insert(namespace.into(), Arc::new(applier));
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.appliers.contains_key(namespace)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.appliers.keys().map(String::as_str)
    }

    pub fn apply(&self, namespace: &str, current: &Value, patches: &[Patch]) -> Result<Value, ReconcileError> {
        let applier = self
            .appliers
            .get(namespace)
            .ok_or_else(|| ReconcileError::UnknownNamespace(namespace.to_string()))?;
        applier.apply(namespace, current, patches)
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::with_generic(GENERIC_NAMESPACES.iter().copied())
    }
}

impl std::fmt::Debug for NamespaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
