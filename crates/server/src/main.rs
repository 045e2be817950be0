// crates/server/src/main.rs
//! Docsight server binary.
//!
//! Reads configuration from the environment, builds the shared state,
//! and serves the API until the process is stopped.

use std::net::SocketAddr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use docsight_server::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn")),
        )
        .compact()
        .init();

    let config = Config::from_env();
    let port = config.port;
    tracing::info!(
        port,
        upstream = %config.upstream_url,
        staging_dir = %config.staging_dir.display(),
        timeout_ms = config.job_timeout.as_millis() as u64,
        "starting docsight server"
    );

    let state = AppState::new(config);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
