#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use beamgate_server::ServiceState;

use crate::config::Cli;

/// Tracing target for startup events.
pub const TRACING_TARGET_STARTUP: &str = "beamgate_cli::startup";
/// Tracing target for shutdown events.
pub const TRACING_TARGET_SHUTDOWN: &str = "beamgate_cli::shutdown";
/// Tracing target for configuration loading.
pub const TRACING_TARGET_CONFIG: &str = "beamgate_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "gateway terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "gateway terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    Cli::init_tracing();

    cli.validate()?;
    cli.log();

    let cancel_token = CancellationToken::new();
    let access = cli
        .access
        .build_service()
        .context("failed to build the access service")?;
    let manager = cli
        .manager
        .spawn_dispatcher(cancel_token.clone())
        .context("failed to start the manager dispatcher")?;

    let state = ServiceState::new(access, manager);
    server::serve(beamgate_server::app(state), &cli.server).await?;

    // The HTTP side has drained; stop the dispatch worker too.
    cancel_token.cancel();
    Ok(())
}
