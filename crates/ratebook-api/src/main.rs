//! # ratebook-api: Binary Entry Point
//!
//! Reads configuration from the environment, installs the tracing
//! subscriber, and serves the API on `0.0.0.0:$PORT`.

use ratebook_api::state::{AppConfig, AppState, LogFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(config = ?config, "starting ratebook api");

    let port = config.port;
    let state = AppState::with_config(config).map_err(|e| {
        tracing::error!("State initialization failed: {e}");
        e
    })?;
    let app = ratebook_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Ratebook API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
