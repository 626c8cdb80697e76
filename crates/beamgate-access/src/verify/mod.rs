//! Pluggable credential verification.
//!
//! A [`CredentialVerifier`] checks one username/password pair against
//! some source of truth and returns the identity it belongs to. The
//! gateway ships three implementations:
//!
//! - [`DictionaryVerifier`]: a fixed user map with Argon2id hashes.
//! - [`DirectoryVerifier`]: delegates to an external directory service.
//! - [`SharedSecretVerifier`]: one secret mapped to one identity.
//!
//! Verifiers are registered by name in a [`ProviderRegistry`]; the name
//! becomes part of the login route.

mod dictionary;
mod directory;
mod hasher;
mod registry;
mod shared_secret;

pub use self::dictionary::DictionaryVerifier;
pub use self::directory::{DirectoryClient, DirectoryVerifier};
pub use self::hasher::CredentialHasher;
pub use self::registry::{ProviderConfig, ProviderRegistry};
pub use self::shared_secret::SharedSecretVerifier;

use async_trait::async_trait;

use crate::error::AuthError;

/// A username/password pair presented for verification.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Identity attributes returned by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl VerifiedIdentity {
    /// Identity with only a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: None,
            email: None,
        }
    }
}

/// One way of checking a credential against a source of truth.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verifies the credential, returning the identity it belongs to.
    ///
    /// Rejections come back as [`AuthError::InvalidCredential`] without
    /// revealing whether the username or the password was wrong.
    async fn verify(&self, credential: &Credential) -> Result<VerifiedIdentity, AuthError>;
}

impl std::fmt::Debug for dyn CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialVerifier")
    }
}
