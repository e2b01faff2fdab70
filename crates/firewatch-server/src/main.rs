//! Firewatch server - hotspot ingestion and line risk scoring

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use firewatch_server::config::Config;
use firewatch_server::state::AppState;
use firewatch_server::{api, loops};

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("firewatch_server=debug".parse()?);
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

async fn shutdown_signal(shutdown: broadcast::Sender<()>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    let _ = shutdown.send(());
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    tracing::info!("Starting firewatch server...");

    let config = Config::from_env();
    let port = config.server_port;
    let state = Arc::new(AppState::from_config(config.clone())?);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start background loops
    let sweep = tokio::spawn(loops::cache_sweep_loop::run_cache_sweep_loop(
        state.clone(),
        shutdown_tx.subscribe(),
    ));

    let app = api::routes(&config)
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    sweep.await?;
    Ok(())
}
