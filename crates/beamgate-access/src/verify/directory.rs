//! Directory-service verifier delegating to an external lookup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::TRACING_TARGET_VERIFY;
use crate::error::AuthError;
use crate::verify::{Credential, CredentialVerifier, VerifiedIdentity};

/// Capability boundary to an external directory: check one credential.
///
/// `Ok(None)` means the directory rejected the credential; `Err` is
/// reserved for infrastructure failures and maps to
/// [`AuthError::ProviderUnavailable`].
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn check(&self, credential: &Credential) -> Result<Option<VerifiedIdentity>, AuthError>;
}

/// Verifier that asks an external directory service, bounded by a hard
/// per-attempt deadline.
pub struct DirectoryVerifier {
    name: String,
    client: Arc<dyn DirectoryClient>,
    timeout: Duration,
}

impl DirectoryVerifier {
    /// Default per-attempt deadline.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a verifier over the given directory client.
    pub fn new(name: impl Into<String>, client: Arc<dyn DirectoryClient>) -> Self {
        Self {
            name: name.into(),
            client,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-attempt deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CredentialVerifier for DirectoryVerifier {
    async fn verify(&self, credential: &Credential) -> Result<VerifiedIdentity, AuthError> {
        match tokio::time::timeout(self.timeout, self.client.check(credential)).await {
            Ok(Ok(Some(identity))) => Ok(identity),
            Ok(Ok(None)) => Err(AuthError::InvalidCredential),
            Ok(Err(error)) => {
                tracing::warn!(
                    target: TRACING_TARGET_VERIFY,
                    provider = %self.name,
                    error = %error,
                    "directory lookup failed"
                );
                Err(AuthError::provider_unavailable(&self.name, error.to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    target: TRACING_TARGET_VERIFY,
                    provider = %self.name,
                    timeout = ?self.timeout,
                    "directory lookup timed out"
                );
                Err(AuthError::provider_unavailable(
                    &self.name,
                    format!("no answer within {:?}", self.timeout),
                ))
            }
        }
    }
}
