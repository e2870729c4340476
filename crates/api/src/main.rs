//! tfmkt - caching football-statistics server
//!
//! Main entry point: load configuration, wire the cache services, start the
//! background refresh loop and serve HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tfmkt_api::utils::logging::{init_tracing, LogFormat};
use tfmkt_api::{router, AppContext};
use tfmkt_infra::config;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Read .env before the subscriber so TFMKT_LOG_FORMAT and RUST_LOG apply.
    let dotenv = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => warn!(error = %e, "Could not load .env file"),
    }

    let config = config::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let context = Arc::new(AppContext::from_config(config).context("failed to initialise")?);
    context.start_background().await.context("failed to start background refresh")?;

    let bind_addr = context.config.server.bind_addr.clone();
    let listener =
        TcpListener::bind(&bind_addr).await.with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "tfmkt server listening");

    let served = axum::serve(listener, router(Arc::clone(&context)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    context.shutdown().await;
    served.context("server error")?;

    info!("tfmkt server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
