//! relay-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and the
//! fanout router draining the event bus.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use relay_gateway::app_state::AppState;
use relay_gateway::auth::{Authenticator, TokenValidator};
use relay_gateway::config::{DirectoryConfig, GatewayConfig};
use relay_gateway::directory::{InMemoryUserDirectory, PostgresUserDirectory, UserDirectory};
use relay_gateway::domain::{CloseReason, EventBus};
use relay_gateway::gateway::{FanoutRouter, FanoutTable, Gateway, GatewaySettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting relay-gateway");

    // Build auth layer
    let directory = build_directory(&config.directory).await?;
    let validator = TokenValidator::new(
        config.jwt_secret.as_bytes(),
        config.jwt_leeway,
        config.token_ttl,
    );
    let authenticator = Arc::new(Authenticator::with_directory(validator, directory));

    // Build gateway and fanout
    let gateway = Arc::new(Gateway::new(
        Arc::clone(&authenticator),
        GatewaySettings::from(&config),
    ));
    let event_bus = EventBus::new(config.event_bus_capacity);
    let transport = Arc::clone(gateway.transport());
    let router = FanoutRouter::new(
        FanoutTable::default(),
        Arc::clone(gateway.registry()),
        transport,
    );
    let router_task = router.spawn(event_bus.subscribe());

    // Build application state
    let app_state = AppState {
        gateway: Arc::clone(&gateway),
        authenticator,
        event_bus,
    };
    let app = relay_gateway::build_app(app_state, config.http_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&gateway)))
        .await?;

    router_task.abort();
    tracing::info!("relay-gateway stopped");
    Ok(())
}

async fn build_directory(config: &DirectoryConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
    match config {
        DirectoryConfig::Postgres {
            url,
            max_connections,
            connect_timeout,
        } => {
            tracing::info!(max_connections, "using PostgreSQL user directory");
            let directory =
                PostgresUserDirectory::connect_lazy(url, *max_connections, *connect_timeout)?;
            Ok(Arc::new(directory))
        }
        DirectoryConfig::Memory {
            seed_file: Some(path),
        } => {
            let directory = InMemoryUserDirectory::from_seed_file(path)
                .await
                .with_context(|| format!("loading user seed file {}", path.display()))?;
            tracing::info!(users = directory.len().await, "using seeded in-memory user directory");
            Ok(Arc::new(directory))
        }
        DirectoryConfig::Memory { seed_file: None } => {
            tracing::warn!("no DATABASE_URL or USER_SEED_FILE; user directory is empty");
            Ok(Arc::new(InMemoryUserDirectory::new()))
        }
    }
}

/// Resolves on Ctrl-C and asks every open connection to close.
async fn shutdown_signal(gateway: Arc<Gateway>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    let connections = gateway.registry().connections();
    tracing::info!(connections = connections.len(), "shutting down");
    for connection in &connections {
        // Close requests bypass the event buffer, so slow clients are closed too.
        if let Err(err) = connection.handle().close(CloseReason::Shutdown) {
            tracing::debug!(connection_id = %connection.id, error = %err, "connection already gone");
        }
    }
}
