//! HTTP transport for [`SyncClient`](crate::SyncClient).
//!
//! Talks to the workspace server:
//!
//! - `POST {base}/api/transactions` with a [`SyncRequest`] body
//! - `GET {base}/api/builds/{build_id}` for a [`BuildSnapshot`]

use crate::client::{Transport, TransportError};
use async_trait::async_trait;
use atelier_common::{BuildSnapshot, SyncRequest, SyncResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let url = format!("{}/api/transactions", self.base_url);
        tracing::trace!(%url, transactions = request.transactions.len(), "POST");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Self::read(response).await
    }

    async fn load(&self, build_id: &str) -> Result<BuildSnapshot, TransportError> {
        let url = format!("{}/api/builds/{}", self.base_url, build_id);
        tracing::trace!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Self::read(response).await
    }
}
