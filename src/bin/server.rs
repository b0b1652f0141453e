//! Whale Alert Aggregator Web Server
//!
//! Serves the alert feed, the merge store, and notification endpoints, with
//! a background poller that keeps the store warm even with no viewers.

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use whalewatch::api::{create_app, AppState};
use whalewatch::{Config, Poller};

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info; override with RUST_LOG for full debugging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║       WHALE ALERT AGGREGATOR - WEB SERVER                     ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Whale threshold: {:<43} ║", format!("${}", config.min_whale_usd));
    println!("║  Poll interval:   {:<43} ║", format!("{}s", config.poll_interval_seconds));
    println!("║  Email alerts:    {:<43} ║", if config.resend_api_key.is_some() { "ENABLED" } else { "DISABLED" });
    println!("║  Telegram alerts: {:<43} ║", if config.telegram_bot_token.is_some() { "ENABLED" } else { "DISABLED" });
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // Create application state
    info!("Initializing application state...");
    let state = AppState::new(config.clone()).await?;

    // Spawn the background ingestion loop
    let poll_state = state.clone();
    let poller = Poller::start(
        Duration::from_secs(config.poll_interval_seconds),
        move || {
            let state = poll_state.clone();
            async move {
                if let Err(e) = state.run_cycle().await {
                    error!("Ingestion cycle failed: {}", e);
                }
            }
        },
    );

    // Create the Axum app
    let app = create_app(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    println!();
    println!("  API:    http://localhost:3000/api");
    println!("  Health: http://localhost:3000/health");
    println!();

    // Run the server until shutdown, then stop the poller cleanly
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.stop().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
