//! HTTP server configuration.

use std::net::SocketAddr;

use clap::Args;

use crate::TRACING_TARGET_CONFIG;

/// Network binding configuration.
///
/// # Environment Variables
///
/// - `SERVER_ADDRESS` - Listen address (default: 0.0.0.0:8080)
#[derive(Debug, Clone, Args)]
#[must_use = "config does nothing unless you use it"]
pub struct ServerConfig {
    /// Socket address the gateway listens on.
    ///
    /// Use `127.0.0.1:8080` to serve localhost only.
    #[arg(long, env = "SERVER_ADDRESS", default_value = "0.0.0.0:8080")]
    pub server_address: SocketAddr,
}

impl ServerConfig {
    /// Whether the configured address binds every interface.
    #[must_use]
    pub fn binds_to_all_interfaces(&self) -> bool {
        self.server_address.ip().is_unspecified()
    }

    /// Logs this configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            address = %self.server_address,
            all_interfaces = self.binds_to_all_interfaces(),
            "server configuration"
        );
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let config = ServerConfig::default();
        assert_eq!(config.server_address.port(), 8080);
        assert!(config.binds_to_all_interfaces());
    }

    #[test]
    fn loopback_does_not_bind_all_interfaces() {
        let config = ServerConfig {
            server_address: "127.0.0.1:9090".parse().unwrap(),
        };
        assert!(!config.binds_to_all_interfaces());
    }
}
