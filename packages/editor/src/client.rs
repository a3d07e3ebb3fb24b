//! # Sync Client
//!
//! The network side of the engine: takes queued transactions, sends them to
//! the server of record in one batch, and tracks the server version the
//! client is patching against.
//!
//! ## Guarantees
//!
//! - Flushes are serialized. A new flush never starts until the previous
//!   response is known, so batches reach the server in enqueue order.
//! - A batch whose outcome is unknown (transport error or timeout) is kept
//!   and resent as-is on the next flush before anything new is taken from
//!   the queue. If the server already applied it, the resend is recognized
//!   as an idempotent replay.
//! - A version conflict stops the client. Local optimistic state is left as
//!   applied; the host decides when to [`reload`](SyncClient::reload).

use crate::engine::SyncEngine;
use crate::sync_queue::QueueEntry;
use crate::EditorError;
use async_trait::async_trait;
use atelier_common::{BuildSnapshot, SyncRequest, SyncResponse};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
}

/// How the client reaches the server of record
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one batch
    async fn send(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError>;

    /// Fetch the authoritative state of a build
    async fn load(&self, build_id: &str) -> Result<BuildSnapshot, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        (**self).send(request).await
    }

    async fn load(&self, build_id: &str) -> Result<BuildSnapshot, TransportError> {
        (**self).load(build_id).await
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Version mismatch at client version {client_version}: {message}")]
    VersionMismatch { client_version: u64, message: String },

    #[error("Server rejected batch: {0}")]
    Rejected(String),

    #[error("Sync halted, reload required: {0}")]
    Halted(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Engine lock poisoned")]
    Poisoned,
}

impl SyncError {
    /// Errors after which flushing cannot continue without a reload
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::VersionMismatch { .. }
                | SyncError::Rejected(_)
                | SyncError::Halted(_)
                | SyncError::Poisoned
        )
    }
}

#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    pub build_id: String,
    pub project_id: String,

    /// Server version the client's containers were loaded at
    pub version: u64,

    /// Period of [`SyncClient::spawn_periodic`]
    pub flush_interval: Duration,

    /// Bound on each network call; expiry counts as an unknown outcome
    pub request_timeout: Duration,
}

impl SyncClientConfig {
    pub fn new(build_id: impl Into<String>, project_id: impl Into<String>, version: u64) -> Self {
        Self {
            build_id: build_id.into(),
            project_id: project_id.into(),
            version,
            flush_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Client-side sync status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Active,
    /// The server moved on without us; edits should be blocked until reload
    Conflicted(String),
    /// The server refused a batch outright
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued
    Idle,
    Synced { version: u64, transactions: usize },
}

#[derive(Debug)]
struct ClientState {
    version: u64,
    /// Batch sent without a known outcome
    in_flight: Option<Vec<QueueEntry>>,
    status: SyncStatus,
}

pub struct SyncClient<T> {
    transport: T,
    config: SyncClientConfig,
    /// Held for the whole flush, which serializes flushes
    state: tokio::sync::Mutex<ClientState>,
    wake: Notify,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(transport: T, config: SyncClientConfig) -> Self {
        let state = ClientState {
            version: config.version,
            in_flight: None,
            status: SyncStatus::Active,
        };
        Self {
            transport,
            config,
            state: tokio::sync::Mutex::new(state),
            wake: Notify::new(),
        }
    }

    pub fn config(&self) -> &SyncClientConfig {
        &self.config
    }

    pub async fn version(&self) -> u64 {
        self.state.lock().await.version
    }

    pub async fn status(&self) -> SyncStatus {
        self.state.lock().await.status.clone()
    }

    /// Whether a batch with unknown outcome is waiting to be resent
    pub async fn has_in_flight(&self) -> bool {
        self.state.lock().await.in_flight.is_some()
    }

    /// Ask a running periodic task to flush now
    pub fn request_flush(&self) {
        self.wake.notify_one();
    }

    /// Send everything pending in one batch.
    pub async fn flush(&self, engine: &Mutex<SyncEngine>) -> Result<FlushOutcome, SyncError> {
        let mut state = self.state.lock().await;

        match &state.status {
            SyncStatus::Active => {}
            SyncStatus::Conflicted(message) | SyncStatus::Failed(message) => {
                return Err(SyncError::Halted(message.clone()));
            }
        }

        let entries = match state.in_flight.take() {
            Some(entries) => {
                tracing::debug!(transactions = entries.len(), "resending unacknowledged batch");
                entries
            }
            None => engine.lock().map_err(|_| SyncError::Poisoned)?.take_pending(),
        };

        if entries.is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let request = SyncRequest {
            transactions: entries.iter().map(QueueEntry::to_wire).collect(),
            build_id: self.config.build_id.clone(),
            project_id: self.config.project_id.clone(),
            version: state.version,
        };

        let sent = tokio::time::timeout(self.config.request_timeout, self.transport.send(&request)).await;
        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "flush failed, keeping batch for retry");
                state.in_flight = Some(entries);
                return Err(err.into());
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.config.request_timeout, "flush timed out, keeping batch for retry");
                state.in_flight = Some(entries);
                return Err(TransportError::Timeout(self.config.request_timeout).into());
            }
        };

        match response {
            SyncResponse::Ok => {
                state.version += 1;
                tracing::info!(
                    version = state.version,
                    transactions = entries.len(),
                    "flushed transactions"
                );
                Ok(FlushOutcome::Synced {
                    version: state.version,
                    transactions: entries.len(),
                })
            }
            SyncResponse::VersionMismatched { errors } => {
                tracing::warn!(client_version = state.version, %errors, "version mismatch");
                state.status = SyncStatus::Conflicted(errors.clone());
                Err(SyncError::VersionMismatch {
                    client_version: state.version,
                    message: errors,
                })
            }
            SyncResponse::Failed { errors } => {
                tracing::error!(%errors, "server rejected batch");
                state.status = SyncStatus::Failed(errors.clone());
                Err(SyncError::Rejected(errors))
            }
        }
    }

    /// Hard refresh: adopt the server's state and version.
    ///
    /// Clears history, the local queue and any unacknowledged batch, then
    /// resumes normal flushing.
    pub async fn reload(&self, engine: &Mutex<SyncEngine>) -> Result<BuildSnapshot, SyncError> {
        let mut state = self.state.lock().await;

        let loaded = tokio::time::timeout(
            self.config.request_timeout,
            self.transport.load(&self.config.build_id),
        )
        .await;
        let snapshot = match loaded {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(self.config.request_timeout).into()),
        };

        engine
            .lock()
            .map_err(|_| SyncError::Poisoned)?
            .reload(&snapshot.namespaces);

        tracing::info!(version = snapshot.version, "reloaded authoritative state");

        state.version = snapshot.version;
        state.in_flight = None;
        state.status = SyncStatus::Active;

        Ok(snapshot)
    }
}

impl<T: Transport + 'static> SyncClient<T> {
    /// Flush on an interval, or sooner when [`request_flush`](Self::request_flush)
    /// is called, until `shutdown` flips to true or a fatal error occurs.
    ///
    /// Transport failures are logged and retried on the next tick.
    pub fn spawn_periodic(
        self: Arc<Self>,
        engine: Arc<Mutex<SyncEngine>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = self.wake.notified() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match self.flush(&engine).await {
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => {
                        tracing::warn!(error = %err, "stopping periodic sync");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "periodic flush failed, will retry");
                    }
                }
            }

            tracing::debug!("periodic sync stopped");
        })
    }
}
