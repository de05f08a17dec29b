//! HTTP server for lesson booking.
//!
//! Exposes schedule views, booking lifecycle, availability management,
//! wallets, billing webhooks and calendar OAuth as a JSON API. Caller
//! identity arrives in headers from the upstream auth layer.

mod config;
mod context;
mod error;
mod routes;
mod state;
mod sweeper;

use database::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting booking API");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let state = AppState::from_config(db, &config)?;
    sweeper::spawn(state.clone(), config.sweep_interval);

    let app = routes::router().with_state(state);

    info!(addr = %config.addr, "Booking API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
