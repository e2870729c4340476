//! Health check endpoint
//!
//! Healthy means the cache store answered a count query; the origin is not
//! probed since stale data can still be served while it is down.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tfmkt_domain::EntityKind;
use tracing::warn;

use crate::context::AppContext;

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok` or `unavailable`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /health`: 200 when the cache store answers, 503 otherwise.
pub async fn health(State(context): State<Arc<AppContext>>) -> impl IntoResponse {
    match context.store.count(EntityKind::Players).await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ok", message: None })),
        Err(e) => {
            warn!(error = %e, "cache store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "unavailable", message: Some(e.to_string()) }),
            )
        }
    }
}
