//! # Server Reconciler
//!
//! Applies client batches to the authoritative build state under
//! optimistic concurrency.
//!
//! ## Decision
//!
//! ```text
//! load build ── stored.version == request.version ──→ apply all, CAS, version + 1
//!      │
//!      └─ versions differ ─┬─ lastTransactionId == batch's last id ──→ ok (replay)
//!                          └─ otherwise ──→ version_mismatched "<stored> != <client>"
//! ```
//!
//! A batch is applied whole or not at all. Losing the compare-and-swap race
//! means someone else moved the version, so the build is reloaded and the
//! batch goes back through the same decision.

use crate::error::ReconcileError;
use crate::namespaces::NamespaceRegistry;
use crate::state::BuildState;
use crate::store::{BuildStore, MemoryStore};
use atelier_common::{BuildSnapshot, SyncRequest, SyncResponse};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Reconciler {
    store: Arc<dyn BuildStore>,
    namespaces: NamespaceRegistry,
}

impl Reconciler {
    pub fn new(store: Arc<dyn BuildStore>, namespaces: NamespaceRegistry) -> Self {
        Self { store, namespaces }
    }

    /// Memory-backed reconciler with the default allow-list
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), NamespaceRegistry::default())
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Handle one sync request. Every failure becomes a response body.
    pub async fn apply(&self, request: &SyncRequest) -> SyncResponse {
        match self.reconcile(request).await {
            Ok(response) => response,
            Err(ReconcileError::Store(err)) => {
                tracing::error!(build_id = %request.build_id, error = %err, "store failure");
                SyncResponse::failed(format!("Store error: {}", err))
            }
            Err(err) => {
                tracing::warn!(build_id = %request.build_id, error = %err, "rejected batch");
                SyncResponse::failed(err.to_string())
            }
        }
    }

    async fn reconcile(&self, request: &SyncRequest) -> Result<SyncResponse, ReconcileError> {
        let last_transaction_id = self.validate(request)?;

        loop {
            let stored = self.load_for(request).await?;

            if stored.version != request.version {
                if stored.last_transaction_id.as_deref() == Some(last_transaction_id) {
                    tracing::info!(
                        build_id = %request.build_id,
                        transaction_id = %last_transaction_id,
                        version = stored.version,
                        "idempotent replay"
                    );
                    return Ok(SyncResponse::Ok);
                }

                tracing::warn!(
                    build_id = %request.build_id,
                    stored = stored.version,
                    client = request.version,
                    "version mismatch"
                );
                return Ok(SyncResponse::VersionMismatched {
                    errors: format!(
                        "You are trying to change the build with a mismatched version: {} != {}",
                        stored.version, request.version
                    ),
                });
            }

            let expected_version = stored.version;
            let next = self.apply_batch(stored, request, last_transaction_id)?;
            let version = next.version;

            if self.store.compare_and_swap(expected_version, next).await? {
                tracing::info!(
                    build_id = %request.build_id,
                    version,
                    transactions = request.transactions.len(),
                    "committed batch"
                );
                return Ok(SyncResponse::Ok);
            }

            tracing::debug!(build_id = %request.build_id, "lost compare-and-swap, reloading");
        }
    }

    /// Checks that need no stored state. Returns the batch's last id.
    fn validate<'a>(&self, request: &'a SyncRequest) -> Result<&'a str, ReconcileError> {
        if request.build_id.is_empty() {
            return Err(ReconcileError::MissingField("buildId"));
        }
        if request.project_id.is_empty() {
            return Err(ReconcileError::MissingField("projectId"));
        }

        for transaction in &request.transactions {
            if transaction.transaction_id.is_empty() {
                return Err(ReconcileError::EmptyTransactionId);
            }
            for change in &transaction.changes {
                if !self.namespaces.contains(&change.namespace) {
                    return Err(ReconcileError::UnknownNamespace(change.namespace.clone()));
                }
            }
        }

        request.last_transaction_id().ok_or(ReconcileError::EmptyBatch)
    }

    async fn load_for(&self, request: &SyncRequest) -> Result<BuildState, ReconcileError> {
        let stored = self
            .store
            .load(&request.build_id)
            .await?
            .ok_or_else(|| ReconcileError::UnknownBuild(request.build_id.clone()))?;

        if stored.project_id != request.project_id {
            return Err(ReconcileError::ProjectMismatch {
                build_id: request.build_id.clone(),
                project_id: request.project_id.clone(),
            });
        }

        Ok(stored)
    }

    /// Every change of every transaction, in order, on a copy of `state`
    fn apply_batch(
        &self,
        mut state: BuildState,
        request: &SyncRequest,
        last_transaction_id: &str,
    ) -> Result<BuildState, ReconcileError> {
        for transaction in &request.transactions {
            for change in &transaction.changes {
                let current = state.namespace(&change.namespace);
                let next = self
                    .namespaces
                    .apply(&change.namespace, &current, &change.patches)?;
                state.namespaces.insert(change.namespace.clone(), next);
            }
        }

        state.version += 1;
        state.last_transaction_id = Some(last_transaction_id.to_string());
        state.updated_at = Utc::now();
        Ok(state)
    }

    /// Authoritative state for a hard refresh
    pub async fn snapshot(&self, build_id: &str) -> Result<BuildSnapshot, ReconcileError> {
        let state = self
            .store
            .load(build_id)
            .await?
            .ok_or_else(|| ReconcileError::UnknownBuild(build_id.to_string()))?;
        Ok(state.snapshot())
    }

    /// Seed a new build at version 0
    pub async fn create_build(
        &self,
        build_id: &str,
        project_id: &str,
        namespaces: BTreeMap<String, Value>,
    ) -> Result<BuildSnapshot, ReconcileError> {
        if build_id.is_empty() {
            return Err(ReconcileError::MissingField("buildId"));
        }
        if project_id.is_empty() {
            return Err(ReconcileError::MissingField("projectId"));
        }
        if let Some(unknown) = namespaces.keys().find(|ns| !self.namespaces.contains(ns)) {
            return Err(ReconcileError::UnknownNamespace(unknown.clone()));
        }

        let state = BuildState::new(build_id, project_id, namespaces);
        let snapshot = state.snapshot();
        self.store.insert(state).await?;

        tracing::info!(%build_id, %project_id, "created build");
        Ok(snapshot)
    }
}
