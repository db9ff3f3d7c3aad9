//! Hyundai Bridge Server
//!
//! Dashboard API, vehicle commands and MQTT/UDP republishing

use anyhow::Result;
use hb_server::{api, config, manager, state};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Hyundai Bridge v{}", env!("CARGO_PKG_VERSION"));

    let store = config::ConfigStore::from_env();
    let app_config = store.load_with_env();
    let port = config::listen_port();
    let public_dir = std::env::var("BRIDGE_PUBLIC_DIR").unwrap_or_else(|_| "public".to_string());

    let state = state::AppState::new(store, app_config.clone())
        .with_listen_port(port)
        .with_public_dir(public_dir);

    // Connect sinks before the first status fetch
    state.sinks.reconfigure(&app_config).await;

    // Build the router
    let app = api::create_router(state.clone());

    // Attach the vehicle and start polling in background
    tokio::spawn(manager::run(state.clone()));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
