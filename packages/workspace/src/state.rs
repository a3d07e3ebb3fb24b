//! Authoritative per-build state

use atelier_common::BuildSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What the server stores for one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildState {
    pub build_id: String,
    pub project_id: String,

    /// Bumped once per accepted batch
    pub version: u64,

    /// Last transaction id of the last accepted batch, used to recognize
    /// a resent batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transaction_id: Option<String>,

    #[serde(default)]
    pub namespaces: BTreeMap<String, Value>,

    pub updated_at: DateTime<Utc>,
}

impl BuildState {
    /// A fresh build at version 0
    pub fn new(
        build_id: impl Into<String>,
        project_id: impl Into<String>,
        namespaces: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            build_id: build_id.into(),
            project_id: project_id.into(),
            version: 0,
            last_transaction_id: None,
            namespaces,
            updated_at: Utc::now(),
        }
    }

    /// Current value of a namespace; never-written namespaces read as `{}`
    pub fn namespace(&self, namespace: &str) -> Value {
        self.namespaces
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    pub fn snapshot(&self) -> BuildSnapshot {
        BuildSnapshot {
            build_id: self.build_id.clone(),
            project_id: self.project_id.clone(),
            version: self.version,
            last_transaction_id: self.last_transaction_id.clone(),
            namespaces: self.namespaces.clone(),
        }
    }
}
