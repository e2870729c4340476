//! Cache inspection endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tfmkt_domain::{CacheKey, CollectionCount, EntityKind, Page, Payload, TfmktError};

use crate::context::AppContext;
use crate::error::ApiResult;

/// Entries in the collection, ignoring paging.
pub const X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");
pub const X_PAGE_SKIP: HeaderName = HeaderName::from_static("x-page-skip");
pub const X_PAGE_LIMIT: HeaderName = HeaderName::from_static("x-page-limit");

/// `GET /cache/stats`: item count per collection, in declaration order.
pub async fn stats(State(context): State<Arc<AppContext>>) -> ApiResult<Json<Vec<CollectionCount>>> {
    let mut counts = Vec::with_capacity(EntityKind::ALL.len());
    for &kind in EntityKind::ALL {
        let count = context.store.count(kind).await?;
        counts.push(CollectionCount { collection_name: kind.to_string(), count });
    }
    Ok(Json(counts))
}

/// Paging query for cache listings; no `limit` returns everything.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Maximum entries returned; must be positive when given.
    pub limit: Option<u32>,
    /// Entries skipped before the first one returned.
    pub skip: Option<u32>,
}

/// `GET /cache/{collection}?limit=&skip=`: cached payloads in key order.
pub async fn list(
    State(context): State<Arc<AppContext>>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let kind = parse_collection(&collection)?;
    if params.limit == Some(0) {
        return Err(TfmktError::InvalidInput("limit must be greater than 0".into()).into());
    }

    let page = Page { limit: params.limit, skip: params.skip.unwrap_or(0) };
    let entries = context.store.list(kind, page).await?;
    let payloads: Vec<Payload> = entries.into_iter().map(|entry| entry.payload).collect();

    let mut headers = HeaderMap::new();
    if let Some(limit) = page.limit {
        let total = context.store.count(kind).await?;
        headers.insert(X_TOTAL_COUNT, HeaderValue::from(total));
        headers.insert(X_PAGE_SKIP, HeaderValue::from(page.skip));
        headers.insert(X_PAGE_LIMIT, HeaderValue::from(limit));
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("X-Total-Count, X-Page-Skip, X-Page-Limit"),
        );
    }

    Ok((headers, Json(payloads)))
}

/// Body of an annotation request
#[derive(Debug, Deserialize)]
pub struct AnnotationRequest {
    /// Top-level payload field to set.
    pub field: String,
    pub value: Value,
}

/// `POST /cache/{collection}/{id}/annotations`: set a top-level field on a
/// cached payload and return the updated payload.
pub async fn annotate(
    State(context): State<Arc<AppContext>>,
    Path((collection, id)): Path<(String, String)>,
    Json(request): Json<AnnotationRequest>,
) -> ApiResult<Json<Payload>> {
    let kind = parse_collection(&collection)?;
    let key = CacheKey::parse(kind, &id)?;
    let entry = context.coordinator.annotate(&key, &request.field, request.value).await?;
    Ok(Json(entry.payload))
}

fn parse_collection(collection: &str) -> Result<EntityKind, TfmktError> {
    collection.parse::<EntityKind>().map_err(|_| {
        let valid: Vec<&str> = EntityKind::ALL.iter().map(|kind| kind.as_str()).collect();
        TfmktError::NotFound(format!(
            "unknown collection '{collection}'; valid collections: {}",
            valid.join(", ")
        ))
    })
}
