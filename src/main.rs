use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use domain_intel::{
    config::Config,
    metrics,
    server::{build_router, AppState},
    DomainIntelClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "domain_intel=info,tower_http=debug".into()),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::load().context("Failed to load configuration")?);
    info!("Configuration loaded successfully");

    let client = DomainIntelClient::new_with_config(Arc::clone(&config))
        .context("Failed to initialize lookup providers")?;

    // Initialize metrics
    metrics::init_metrics();

    let app = build_router(AppState::with_token_auth(client, Arc::clone(&config)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Domain intelligence service listening on {}", addr);
    info!("Lookup: http://{}/domain-info?domain=example.com", addr);
    info!("Health check: http://{}/health", addr);
    info!("Metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, gracefully shutting down..."),
        Err(e) => {
            warn!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
