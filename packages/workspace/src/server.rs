//! HTTP surface of the workspace server.
//!
//! | Route                       | Body                                  |
//! |-----------------------------|---------------------------------------|
//! | `POST /api/transactions`    | `SyncRequest` → sync response (200)   |
//! | `GET /api/builds/:build_id` | `BuildSnapshot`, 404 `{errors}`       |
//! | `POST /api/builds`          | `CreateBuildRequest` → `BuildSnapshot`|
//! | `GET /health`               | `ok`                                  |

use crate::error::{ReconcileError, StoreError};
use crate::reconciler::Reconciler;
use atelier_common::{SyncRequest, SyncResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBuildRequest {
    pub build_id: String,
    pub project_id: String,
    #[serde(default)]
    pub namespaces: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    errors: String,
}

pub fn router(reconciler: Arc<Reconciler>) -> Router {
    Router::new()
        .route("/api/transactions", post(transactions_handler))
        .route("/api/builds", post(create_build_handler))
        .route("/api/builds/:build_id", get(build_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(reconciler)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn transactions_handler(
    State(reconciler): State<Arc<Reconciler>>,
    Json(request): Json<SyncRequest>,
) -> Json<SyncResponse> {
    tracing::debug!(
        build_id = %request.build_id,
        version = request.version,
        transactions = request.transactions.len(),
        "received sync request"
    );
    Json(reconciler.apply(&request).await)
}

async fn build_handler(
    State(reconciler): State<Arc<Reconciler>>,
    Path(build_id): Path<String>,
) -> Response {
    match reconciler.snapshot(&build_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_build_handler(
    State(reconciler): State<Arc<Reconciler>>,
    Json(request): Json<CreateBuildRequest>,
) -> Response {
    match reconciler
        .create_build(&request.build_id, &request.project_id, request.namespaces)
        .await
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ReconcileError) -> Response {
    let status = match &err {
        ReconcileError::UnknownBuild(_) => StatusCode::NOT_FOUND,
        ReconcileError::Store(StoreError::AlreadyExists(_)) => StatusCode::CONFLICT,
        ReconcileError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };

    (
        status,
        Json(ErrorBody {
            errors: err.to_string(),
        }),
    )
        .into_response()
}
