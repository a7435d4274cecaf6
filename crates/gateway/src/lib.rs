//! API Gateway Library
//!
//! HTTP surface of the lead desk: the public funnel, provider webhooks and
//! the authenticated staff API, served over the embedded lead service.

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use lead_service_lib::config::LeadServiceConfig;
use lead_service_lib::repository::InMemoryStore;
use lead_service_lib::Embedded;

use crate::config::GatewayConfig;
use crate::middleware::Cache;
use crate::routes::create_router;
use crate::state::AppState;

/// Router with request tracing, ready to serve.
pub fn build_app(state: AppState) -> Router {
    create_router(state).layer(TraceLayer::new_for_http())
}

/// Lead services over PostgreSQL, or over the in-memory store.
pub async fn embed_services(
    config: &LeadServiceConfig,
    in_memory: bool,
) -> Result<Embedded, Box<dyn std::error::Error>> {
    if in_memory {
        Ok(lead_service_lib::embed_in_memory(config, InMemoryStore::new()))
    } else {
        Ok(lead_service_lib::embed(config).await?)
    }
}

/// Application state over `embedded`. Redis is skipped in memory mode,
/// which also disables rate limiting and lookup caching.
pub async fn app_state(
    embedded: &Embedded,
    config: GatewayConfig,
) -> Result<AppState, Box<dyn std::error::Error>> {
    config.check()?;

    let cache = match embedded.database {
        Some(_) => Some(Arc::new(Cache::connect(&config.cache).await?)),
        None => {
            tracing::warn!("Running without Redis: rate limiting is disabled");
            None
        }
    };

    Ok(AppState::new(
        embedded.services.clone(),
        cache,
        embedded.database.clone(),
        config,
    ))
}

/// Serve until Ctrl+C.
pub async fn serve(
    host: &str,
    port: u16,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping gateway...");
        }
    })
    .await?;

    Ok(())
}

/// Standalone gateway: embed the services, then serve.
pub async fn run_server(
    host: &str,
    port: u16,
    in_memory: bool,
    bootstrap_admin: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let lead_config = LeadServiceConfig::from_env();
    let embedded = embed_services(&lead_config, in_memory).await?;

    if let Some(email) = bootstrap_admin {
        lead_service_lib::bootstrap_superadmin(&embedded.stores, email).await?;
    }

    let state = app_state(&embedded, GatewayConfig::from_env()).await?;
    serve(host, port, state).await
}
