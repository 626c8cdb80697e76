//! Access service configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use rand::RngCore;

use beamgate_access::{
    AccessConfig, AccessService, MemoryStore, ProviderConfig, ProviderRegistry, TokenSigner,
};
use beamgate_core::AccessPolicy;

use crate::TRACING_TARGET_CONFIG;

/// Authentication and access-policy configuration.
///
/// # Environment Variables
///
/// - `AUTH_SECRET_KEYS` - Semicolon-separated signing keys, newest first
/// - `ACCESS_TOKEN_MAX_AGE` - Access-token lifetime in seconds
/// - `REFRESH_TOKEN_MAX_AGE` - Refresh-token lifetime in seconds
/// - `SESSION_MAX_AGE` - Session lifetime in seconds
/// - `SINGLE_USER_API_KEY` - Master key of the single-user mode
/// - `ALLOW_ANONYMOUS_ACCESS` - Serve credential-less requests
/// - `AUTH_PROVIDERS` - Identity providers as a JSON list
/// - `ACCESS_POLICY` - Role and user policy as a JSON document
#[derive(Debug, Clone, Args)]
#[must_use = "config does nothing unless you use it"]
pub struct AccessArgs {
    /// Token-signing keys; the first signs, the rest still verify.
    ///
    /// Rotate by prepending a fresh key and keeping the old ones until
    /// their tokens have expired. With no key configured an ephemeral
    /// one is generated, so tokens do not survive a restart.
    #[arg(long, env = "AUTH_SECRET_KEYS", value_delimiter = ';', hide_env_values = true)]
    pub auth_secret_keys: Vec<String>,

    /// Access-token lifetime in seconds.
    #[arg(long, env = "ACCESS_TOKEN_MAX_AGE", default_value_t = 900)]
    pub access_token_max_age: u64,

    /// Refresh-token lifetime in seconds.
    #[arg(long, env = "REFRESH_TOKEN_MAX_AGE", default_value_t = 604_800)]
    pub refresh_token_max_age: u64,

    /// Login-session lifetime in seconds.
    #[arg(long, env = "SESSION_MAX_AGE", default_value_t = 31_536_000)]
    pub session_max_age: u64,

    /// Secret that signs in as the single-user principal.
    #[arg(long, env = "SINGLE_USER_API_KEY", hide_env_values = true)]
    pub single_user_api_key: Option<String>,

    /// Serve credential-less requests as the public principal.
    #[arg(long, env = "ALLOW_ANONYMOUS_ACCESS")]
    pub allow_anonymous_access: bool,

    /// Identity providers as a JSON list of `{kind, name, ...}` entries.
    ///
    /// Supported kinds: `dictionary`, `directory`, `shared_secret`.
    #[arg(long, env = "AUTH_PROVIDERS")]
    pub auth_providers: Option<String>,

    /// Role overrides and per-user role grants as a JSON document.
    ///
    /// Omitted means the built-in roles with no user entries, which
    /// only serves the single-user and anonymous modes.
    #[arg(long, env = "ACCESS_POLICY")]
    pub access_policy: Option<String>,
}

impl AccessArgs {
    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.access_token_max_age == 0 {
            bail!("--access-token-max-age must be at least 1 second");
        }
        if self.refresh_token_max_age == 0 {
            bail!("--refresh-token-max-age must be at least 1 second");
        }
        if self.session_max_age == 0 {
            bail!("--session-max-age must be at least 1 second");
        }
        self.providers()?;
        self.policy()?;
        Ok(())
    }

    /// Builds the fully wired access service.
    pub fn build_service(&self) -> anyhow::Result<AccessService> {
        let registry = ProviderRegistry::build(self.providers()?, BTreeMap::new())
            .context("failed to build the provider registry")?;
        let signer = TokenSigner::new(self.signing_secrets())
            .context("failed to build the token signer")?;

        Ok(AccessService::new(
            registry,
            signer,
            MemoryStore::shared(),
            self.policy()?,
            self.access_config(),
        ))
    }

    /// Logs the non-secret parts of this configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            signing_keys = self.configured_secrets().len(),
            access_token_max_age = self.access_token_max_age,
            refresh_token_max_age = self.refresh_token_max_age,
            session_max_age = self.session_max_age,
            single_user_mode = self.single_user_api_key.is_some(),
            anonymous_access = self.allow_anonymous_access,
            providers_configured = self.auth_providers.is_some(),
            policy_configured = self.access_policy.is_some(),
            "access configuration"
        );
    }

    /// Configured signing keys with empty entries dropped.
    fn configured_secrets(&self) -> Vec<String> {
        self.auth_secret_keys
            .iter()
            .filter(|key| !key.is_empty())
            .cloned()
            .collect()
    }

    /// The signing keys to use, generating an ephemeral one if needed.
    fn signing_secrets(&self) -> Vec<String> {
        let secrets = self.configured_secrets();
        if !secrets.is_empty() {
            return secrets;
        }

        tracing::warn!(
            target: TRACING_TARGET_CONFIG,
            "no signing key configured, generated an ephemeral one; \
             tokens will not survive a restart"
        );
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        vec![hex::encode(bytes)]
    }

    fn providers(&self) -> anyhow::Result<Vec<ProviderConfig>> {
        match &self.auth_providers {
            Some(json) => {
                serde_json::from_str(json).context("--auth-providers is not a valid provider list")
            }
            None => Ok(Vec::new()),
        }
    }

    fn policy(&self) -> anyhow::Result<AccessPolicy> {
        match &self.access_policy {
            Some(json) => {
                AccessPolicy::from_json(json).context("--access-policy is not a valid policy")
            }
            None => Ok(AccessPolicy::default()),
        }
    }

    fn access_config(&self) -> AccessConfig {
        let mut config = AccessConfig::new()
            .with_access_token_max_age(Duration::from_secs(self.access_token_max_age))
            .with_refresh_token_max_age(Duration::from_secs(self.refresh_token_max_age))
            .with_session_max_age(Duration::from_secs(self.session_max_age))
            .with_anonymous_access(self.allow_anonymous_access);
        if let Some(key) = &self.single_user_api_key {
            config = config.with_single_user_api_key(key);
        }
        config
    }
}
