//! Entity reads.
//!
//! The body is the cached payload untouched; freshness travels in headers so
//! clients that only want the data can ignore it.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderName;
use axum::response::IntoResponse;
use axum::routing::{get, MethodRouter};
use axum::Json;
use tfmkt_domain::{CacheKey, EntityKind, ResolveSource, Resolved};
use tracing::debug;

use crate::context::AppContext;
use crate::error::ApiResult;

/// `HIT`, `MISS` or `STALE`
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_STALE: HeaderName = HeaderName::from_static("x-cache-stale");
/// RFC 3339 time the served payload was fetched from the origin.
pub const X_CACHE_FETCHED_AT: HeaderName = HeaderName::from_static("x-cache-fetched-at");

/// GET route resolving `{id}` within `kind`.
pub fn route(kind: EntityKind) -> MethodRouter<Arc<AppContext>> {
    get(move |State(context): State<Arc<AppContext>>, Path(id): Path<String>| async move {
        resolve(context, kind, id).await
    })
}

async fn resolve(
    context: Arc<AppContext>,
    kind: EntityKind,
    id: String,
) -> ApiResult<impl IntoResponse> {
    let key = CacheKey::parse(kind, &id)?;
    let resolved = context.coordinator.resolve(&key).await?;
    debug!(%key, source = %resolved.source, stale = resolved.stale, "entity served");

    Ok((cache_headers(&resolved), Json(resolved.payload)))
}

fn cache_headers(resolved: &Resolved) -> [(HeaderName, String); 3] {
    let status = match resolved.source {
        ResolveSource::Cache => "HIT",
        ResolveSource::Origin => "MISS",
        ResolveSource::Fallback => "STALE",
    };
    [
        (X_CACHE, status.to_string()),
        (X_CACHE_STALE, resolved.stale.to_string()),
        (X_CACHE_FETCHED_AT, resolved.fetched_at.to_rfc3339()),
    ]
}
