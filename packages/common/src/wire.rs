//! Wire protocol between the editor and the server of record.
//!
//! One [`SyncRequest`] is sent per flush. It carries every queued
//! transaction in enqueue order plus the version the client believes it is
//! patching against. The server answers with a [`SyncResponse`].

use crate::patch::Patch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Patches for one namespace inside a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub namespace: String,
    pub patches: Vec<Patch>,
}

/// One transaction as it travels over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTransaction {
    pub transaction_id: String,
    pub changes: Vec<Change>,
}

/// Batch sent on every flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub transactions: Vec<SyncTransaction>,
    pub build_id: String,
    pub project_id: String,
    /// Version the client believes the server is at
    pub version: u64,
}

impl SyncRequest {
    /// Id of the last transaction in the batch (the server's replay marker)
    pub fn last_transaction_id(&self) -> Option<&str> {
        self.transactions
            .last()
            .map(|transaction| transaction.transaction_id.as_str())
    }
}

/// Server answer to a [`SyncRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawSyncResponse", try_from = "RawSyncResponse")]
pub enum SyncResponse {
    /// Applied, or recognized as an already-applied retry
    Ok,

    /// The stored version moved on and the batch is not a retry
    VersionMismatched { errors: String },

    /// Malformed request or unexpected server failure
    Failed { errors: String },
}

impl SyncResponse {
    pub fn failed(errors: impl Into<String>) -> Self {
        SyncResponse::Failed {
            errors: errors.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SyncResponse::Ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawStatus {
    Ok,
    VersionMismatched,
}

/// Flat `{status?, errors?}` shape used on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSyncResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<RawStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    errors: Option<String>,
}

impl From<SyncResponse> for RawSyncResponse {
    fn from(response: SyncResponse) -> Self {
        match response {
            SyncResponse::Ok => RawSyncResponse {
                status: Some(RawStatus::Ok),
                errors: None,
            },
            SyncResponse::VersionMismatched { errors } => RawSyncResponse {
                status: Some(RawStatus::VersionMismatched),
                errors: Some(errors),
            },
            SyncResponse::Failed { errors } => RawSyncResponse {
                status: None,
                errors: Some(errors),
            },
        }
    }
}

impl TryFrom<RawSyncResponse> for SyncResponse {
    type Error = String;

    fn try_from(raw: RawSyncResponse) -> Result<Self, Self::Error> {
        match (raw.status, raw.errors) {
            (Some(RawStatus::Ok), _) => Ok(SyncResponse::Ok),
            (Some(RawStatus::VersionMismatched), errors) => Ok(SyncResponse::VersionMismatched {
                errors: errors.unwrap_or_default(),
            }),
            (None, Some(errors)) => Ok(SyncResponse::Failed { errors }),
            (None, None) => Err("sync response has neither status nor errors".to_string()),
        }
    }
}

/// Authoritative state of a build, used for the initial load and for a
/// hard refresh after a version conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSnapshot {
    pub build_id: String,
    pub project_id: String,
    pub version: u64,
    #[serde(default)]
    pub last_transaction_id: Option<String>,
    pub namespaces: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = SyncRequest {
            transactions: vec![SyncTransaction {
                transaction_id: "t1".to_string(),
                changes: vec![Change {
                    namespace: "pages".to_string(),
                    patches: vec![Patch::replace(path!["home", "title"], json!("Home"))],
                }],
            }],
            build_id: "build-1".to_string(),
            project_id: "project-1".to_string(),
            version: 5,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "transactions": [{
                    "transactionId": "t1",
                    "changes": [{
                        "namespace": "pages",
                        "patches": [{ "op": "replace", "path": ["home", "title"], "value": "Home" }]
                    }]
                }],
                "buildId": "build-1",
                "projectId": "project-1",
                "version": 5
            })
        );
        assert_eq!(request.last_transaction_id(), Some("t1"));
    }

    #[test]
    fn test_response_wire_shapes() {
        assert_eq!(
            serde_json::to_value(SyncResponse::Ok).unwrap(),
            json!({ "status": "ok" })
        );
        assert_eq!(
            serde_json::to_value(SyncResponse::VersionMismatched {
                errors: "6 != 5".to_string()
            })
            .unwrap(),
            json!({ "status": "version_mismatched", "errors": "6 != 5" })
        );
        assert_eq!(
            serde_json::to_value(SyncResponse::failed("boom")).unwrap(),
            json!({ "errors": "boom" })
        );
    }

    #[test]
    fn test_response_parsing() {
        let ok: SyncResponse = serde_json::from_value(json!({ "status": "ok" })).unwrap();
        assert!(ok.is_ok());

        let failed: SyncResponse = serde_json::from_value(json!({ "errors": "bad" })).unwrap();
        assert_eq!(failed, SyncResponse::failed("bad"));

        assert!(serde_json::from_value::<SyncResponse>(json!({})).is_err());
    }
}
