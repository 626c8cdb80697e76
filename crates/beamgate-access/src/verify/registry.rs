//! Provider registry assembled from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::verify::{
    CredentialVerifier, DictionaryVerifier, DirectoryClient, DirectoryVerifier,
    SharedSecretVerifier,
};

/// One provider entry in the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Fixed username/password map. Passwords are hashed at startup and
    /// the plaintext is dropped.
    Dictionary {
        name: String,
        users: BTreeMap<String, String>,
    },
    /// External directory service. The protocol client is injected at
    /// build time under the same name.
    Directory {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
    /// One secret mapped to one identity.
    SharedSecret {
        name: String,
        secret: String,
        username: String,
    },
}

impl ProviderConfig {
    /// The registry name of this provider.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Dictionary { name, .. }
            | Self::Directory { name, .. }
            | Self::SharedSecret { name, .. } => name,
        }
    }
}

/// Named credential verifiers, immutable after startup.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn CredentialVerifier>>,
}

impl ProviderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a verifier under the given name, replacing any previous one.
    #[must_use]
    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        self.providers.insert(name.into(), verifier);
        self
    }

    /// Builds a registry from configuration entries.
    ///
    /// Directory providers need a matching client in `directory_clients`;
    /// a missing client is a startup error, not a runtime surprise.
    pub fn build(
        configs: Vec<ProviderConfig>,
        directory_clients: BTreeMap<String, Arc<dyn DirectoryClient>>,
    ) -> Result<Self, AuthError> {
        let mut registry = Self::new();
        for config in configs {
            let name = config.name().to_owned();
            let verifier: Arc<dyn CredentialVerifier> = match config {
                ProviderConfig::Dictionary { users, .. } => {
                    Arc::new(DictionaryVerifier::from_plain(users)?)
                }
                ProviderConfig::Directory { timeout_secs, .. } => {
                    let client = directory_clients.get(&name).cloned().ok_or_else(|| {
                        AuthError::unknown(format!(
                            "directory provider '{name}' has no registered directory client"
                        ))
                    })?;
                    let mut verifier = DirectoryVerifier::new(&name, client);
                    if let Some(secs) = timeout_secs {
                        verifier = verifier.with_timeout(Duration::from_secs(secs));
                    }
                    Arc::new(verifier)
                }
                ProviderConfig::SharedSecret {
                    secret, username, ..
                } => Arc::new(SharedSecretVerifier::new(secret, username)),
            };
            registry.providers.insert(name, verifier);
        }
        Ok(registry)
    }

    /// Looks up a provider by name.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn CredentialVerifier>, AuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::provider_not_found(name))
    }

    /// Registered provider names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
