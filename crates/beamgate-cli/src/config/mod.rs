//! CLI configuration management.
//!
//! The configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── server: ServerConfig   # listen address
//! ├── access: AccessArgs     # signing keys, providers, policy, modes
//! └── manager: ManagerArgs   # dispatcher address, deadline, sealing
//! ```
//!
//! Every option can be provided as a CLI argument or an environment
//! variable. Use `--help` to see all available options.

mod access;
mod manager;
mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use self::access::AccessArgs;
pub use self::manager::ManagerArgs;
pub use self::server::ServerConfig;
use crate::TRACING_TARGET_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "beamgate")]
#[command(about = "Authenticated HTTP gateway for the queue-server manager")]
#[command(version)]
pub struct Cli {
    /// Network binding configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Authentication and access-policy configuration.
    #[clap(flatten)]
    pub access: AccessArgs,

    /// Manager transport configuration.
    #[clap(flatten)]
    pub manager: ManagerArgs,
}

impl Cli {
    /// Loads `.env` (if enabled) and parses CLI arguments.
    ///
    /// Loading the environment first lets clap's `env` fallbacks pick
    /// up values from `.env` files.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.access
            .validate()
            .context("invalid access configuration")?;
        self.manager
            .validate()
            .context("invalid manager configuration")?;
        Ok(())
    }

    /// Logs the effective configuration. Secrets never appear.
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.access.log();
        self.manager.log();
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::try_parse_from(["beamgate"]).unwrap();
        assert_eq!(cli.server.server_address.port(), 8080);
        assert_eq!(cli.manager.manager_address, "127.0.0.1:60615");
        assert_eq!(cli.manager.manager_timeout, 10);
        assert_eq!(cli.manager.manager_queue_capacity, 32);
        assert_eq!(cli.access.access_token_max_age, 900);
        assert_eq!(cli.access.refresh_token_max_age, 604_800);
        assert_eq!(cli.access.session_max_age, 31_536_000);
        assert!(!cli.access.allow_anonymous_access);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn secret_keys_split_on_semicolons() {
        let cli = Cli::try_parse_from(["beamgate", "--auth-secret-keys", "new;old;older"])
            .unwrap();
        assert_eq!(cli.access.auth_secret_keys, ["new", "old", "older"]);
    }

    #[test]
    fn full_argument_set_parses() {
        let cli = Cli::try_parse_from([
            "beamgate",
            "--server-address",
            "127.0.0.1:9090",
            "--allow-anonymous-access",
            "--single-user-api-key",
            "swordfish",
            "--manager-address",
            "qserver.lab:60615",
            "--manager-timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.server.server_address.to_string(), "127.0.0.1:9090");
        assert!(cli.access.allow_anonymous_access);
        assert_eq!(cli.access.single_user_api_key.as_deref(), Some("swordfish"));
        assert_eq!(cli.manager.manager_address, "qserver.lab:60615");
        assert_eq!(cli.manager.manager_timeout, 30);
    }
}
