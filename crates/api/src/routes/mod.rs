//! HTTP routes
//!
//! - Entity reads, one route per collection, served through the coordinator
//! - Cache inspection (`/cache/...`)
//! - Health check and the root redirect

pub mod cache;
pub mod entities;
pub mod health;

use std::sync::Arc;

use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;
use tfmkt_domain::EntityKind;

use crate::context::AppContext;

/// Build the application router over a shared context.
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::temporary("/health") }))
        .route("/health", get(health::health))
        .route("/competitions/{id}/clubs", entities::route(EntityKind::Competitions))
        .route("/clubs/{id}/profile", entities::route(EntityKind::Clubs))
        .route("/players/{id}/profile", entities::route(EntityKind::Players))
        .route("/players/{id}/market_value", entities::route(EntityKind::PlayerMarketValues))
        .route("/players/{id}/transfers", entities::route(EntityKind::PlayerTransfers))
        .route("/players/{id}/jersey_numbers", entities::route(EntityKind::PlayerJerseyNumbers))
        .route("/players/{id}/stats", entities::route(EntityKind::PlayerStats))
        .route("/players/{id}/achievements", entities::route(EntityKind::PlayerAchievements))
        .route("/players/{id}/injuries", entities::route(EntityKind::PlayerInjuries))
        .route("/cache/stats", get(cache::stats))
        .route("/cache/{collection}", get(cache::list))
        .route("/cache/{collection}/{id}/annotations", post(cache::annotate))
        .with_state(context)
}
