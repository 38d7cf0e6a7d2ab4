//! Gateway server setup
//!
//! Provides the WebSocket server configuration, routes and startup sequence.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::{GatewayState, GatewayStateBuilder};

use crate::handlers::{HandlerRegistry, RoutingDescriptor};
use crate::services::ReconnectPolicy;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use switchboard_common::{fetch_signing_keys, AppConfig, AppError, AppResult, ConfigError, SigningKeys};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/", get(gateway_handler))
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assemble `GatewayState` from configuration
///
/// Loads the routing descriptor from `config.routes.file` and resolves it
/// against `registry` plus the built-in handlers.
pub fn create_gateway_state(
    config: &AppConfig,
    signing_keys: SigningKeys,
    registry: HandlerRegistry,
) -> Result<GatewayState, AppError> {
    let routes = RoutingDescriptor::load(&config.routes.file)?;

    GatewayState::builder()
        .services(config.services.clone())
        .reconnect(ReconnectPolicy::from(&config.reconnect))
        .routes(routes)
        .registry(registry)
        .signing_keys(signing_keys)
        .heartbeat(config.heartbeat.clone())
        .transaction_config(config.transactions.clone())
        .build()
}

/// Run the gateway server until Ctrl-C
pub async fn run_server(state: GatewayState, addr: SocketAddr) -> AppResult<()> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr).await.map_err(|source| AppError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    state.start();

    let app = create_app(state.clone());
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(e.to_string()));

    state.shutdown().await;

    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> AppResult<()> {
    run_with_handlers(config, HandlerRegistry::new()).await
}

/// Run the gateway with additional local handlers
pub async fn run_with_handlers(config: AppConfig, registry: HandlerRegistry) -> AppResult<()> {
    let addr: SocketAddr = config.gateway.address().parse().map_err(|e| {
        ConfigError::InvalidValue("GATEWAY_HOST", format!("{}: {e}", config.gateway.address()))
    })?;

    // Startup is aborted if the keys cannot be fetched
    let signing_keys = fetch_signing_keys(&config.identity.jwks_url).await?;

    let state = create_gateway_state(&config, signing_keys, registry)?;

    run_server(state, addr).await
}
