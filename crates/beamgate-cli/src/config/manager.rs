//! Manager transport configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use tokio_util::sync::CancellationToken;

use beamgate_dispatch::{
    DispatchConfig, DispatchWorker, ManagerClient, PayloadCodec, PlainCodec, SealedCodec,
    TransportKey,
};

use crate::TRACING_TARGET_CONFIG;

/// Queue-server manager connection configuration.
///
/// # Environment Variables
///
/// - `MANAGER_ADDRESS` - Manager socket address, `host:port`
/// - `MANAGER_TIMEOUT` - Per-call deadline in seconds
/// - `MANAGER_QUEUE_CAPACITY` - Bound of the submission queue
/// - `MANAGER_ENCRYPTION_KEY` - Hex-encoded 32-byte transport key
#[derive(Debug, Clone, Args)]
#[must_use = "config does nothing unless you use it"]
pub struct ManagerArgs {
    /// Socket address of the queue-server manager.
    #[arg(long, env = "MANAGER_ADDRESS", default_value = DispatchConfig::DEFAULT_ADDRESS)]
    pub manager_address: String,

    /// Deadline in seconds covering one full manager round trip.
    #[arg(long, env = "MANAGER_TIMEOUT", default_value_t = 10)]
    pub manager_timeout: u64,

    /// How many calls may wait for the manager before 503s start.
    #[arg(long, env = "MANAGER_QUEUE_CAPACITY", default_value_t = 32)]
    pub manager_queue_capacity: usize,

    /// Hex-encoded 32-byte key sealing manager traffic.
    ///
    /// Omitted means plaintext frames, which is only safe on a
    /// loopback or otherwise trusted link.
    #[arg(long, env = "MANAGER_ENCRYPTION_KEY", hide_env_values = true)]
    pub manager_encryption_key: Option<String>,
}

impl ManagerArgs {
    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=300).contains(&self.manager_timeout) {
            bail!("--manager-timeout must be between 1 and 300 seconds");
        }
        if self.manager_queue_capacity == 0 {
            bail!("--manager-queue-capacity must be at least 1");
        }
        self.codec().map(drop)
    }

    /// Spawns the dispatch worker and returns the client handle.
    ///
    /// The worker runs until the token is cancelled.
    pub fn spawn_dispatcher(
        &self,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<ManagerClient> {
        let sealed = self.manager_encryption_key.is_some();
        let (worker, client) =
            DispatchWorker::new(self.dispatch_config(), self.codec()?, cancel_token);
        worker.spawn();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            address = %self.manager_address,
            sealed,
            "manager dispatcher started"
        );
        Ok(client)
    }

    /// Logs the non-secret parts of this configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            address = %self.manager_address,
            timeout_secs = self.manager_timeout,
            queue_capacity = self.manager_queue_capacity,
            sealed = self.manager_encryption_key.is_some(),
            "manager configuration"
        );
    }

    fn codec(&self) -> anyhow::Result<Arc<dyn PayloadCodec>> {
        let Some(encoded) = &self.manager_encryption_key else {
            return Ok(Arc::new(PlainCodec));
        };

        let bytes = hex::decode(encoded).context("--manager-encryption-key is not valid hex")?;
        let key = TransportKey::from_bytes(&bytes)
            .context("--manager-encryption-key must decode to exactly 32 bytes")?;
        Ok(Arc::new(SealedCodec::new(key)))
    }

    fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new(self.manager_address.clone())
            .with_request_timeout(Duration::from_secs(self.manager_timeout))
            .with_queue_capacity(self.manager_queue_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "6265616d676174652d7472616e73706f72742d6b65792d666f722d7465737473";

    fn args() -> ManagerArgs {
        ManagerArgs {
            manager_address: DispatchConfig::DEFAULT_ADDRESS.to_owned(),
            manager_timeout: 10,
            manager_queue_capacity: 32,
            manager_encryption_key: None,
        }
    }

    #[test]
    fn no_key_selects_the_plain_codec() {
        let codec = args().codec().unwrap();
        assert_eq!(codec.seal(b"payload").unwrap(), b"payload");
    }

    #[test]
    fn key_selects_the_sealing_codec() {
        let mut args = args();
        args.manager_encryption_key = Some(TEST_KEY.to_owned());
        let codec = args.codec().unwrap();
        assert_ne!(codec.seal(b"payload").unwrap(), b"payload");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let mut args = args();
        args.manager_encryption_key = Some("zz".to_owned());
        assert!(args.validate().is_err());

        args.manager_encryption_key = Some("abcd".to_owned());
        assert!(args.validate().is_err());
    }

    #[test]
    fn out_of_range_tunables_are_rejected() {
        let mut zero_timeout = args();
        zero_timeout.manager_timeout = 0;
        assert!(zero_timeout.validate().is_err());

        let mut zero_capacity = args();
        zero_capacity.manager_queue_capacity = 0;
        assert!(zero_capacity.validate().is_err());
    }

    #[test]
    fn dispatch_config_carries_the_tunables() {
        let mut args = args();
        args.manager_address = "manager.beamline.lab:60615".to_owned();
        args.manager_timeout = 25;
        args.manager_queue_capacity = 4;

        let config = args.dispatch_config();
        assert_eq!(config.address, "manager.beamline.lab:60615");
        assert_eq!(config.request_timeout, Duration::from_secs(25));
        assert_eq!(config.queue_capacity, 4);
    }
}
