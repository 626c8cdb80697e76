//! Single shared-secret verifier.

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::verify::{Credential, CredentialVerifier, VerifiedIdentity};

/// Verifies one fixed secret and maps it to one fixed identity.
///
/// The password field carries the secret; the presented username is
/// ignored. Comparison is constant time.
pub struct SharedSecretVerifier {
    secret: String,
    identity: VerifiedIdentity,
}

impl SharedSecretVerifier {
    /// Creates a verifier for the given secret and identity username.
    pub fn new(secret: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            identity: VerifiedIdentity::new(username),
        }
    }
}

impl std::fmt::Debug for SharedSecretVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretVerifier")
            .field("secret", &"[REDACTED]")
            .field("identity", &self.identity)
            .finish()
    }
}

#[async_trait]
impl CredentialVerifier for SharedSecretVerifier {
    async fn verify(&self, credential: &Credential) -> Result<VerifiedIdentity, AuthError> {
        let matches: bool = self
            .secret
            .as_bytes()
            .ct_eq(credential.password.as_bytes())
            .into();
        if matches {
            Ok(self.identity.clone())
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}
