//! HTTP server startup and lifecycle.

mod shutdown;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::{TRACING_TARGET_SHUTDOWN, TRACING_TARGET_STARTUP};

/// Serves the app until a shutdown signal arrives.
///
/// Binds the configured address, runs the server, and drains open
/// connections on SIGTERM or Ctrl+C before returning.
pub async fn serve(app: Router, config: &ServerConfig) -> anyhow::Result<()> {
    let address = config.server_address;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        address = %address,
        "gateway is ready and listening for connections"
    );
    if config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            "Server is bound to all interfaces. Ensure firewall rules are properly configured."
        );
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::shutdown_signal())
    .await
    .context("server runtime failure")?;

    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "gateway shut down gracefully");
    Ok(())
}
