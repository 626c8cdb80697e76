//! Fixed-dictionary verifier backed by Argon2id hashes.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::TRACING_TARGET_VERIFY;
use crate::error::AuthError;
use crate::verify::hasher::CredentialHasher;
use crate::verify::{Credential, CredentialVerifier, VerifiedIdentity};

/// Verifies against a fixed username to password-hash map.
///
/// Intended for demo deployments and tests. Only PHC-format Argon2id
/// hashes are stored; plaintext passwords never outlive construction.
#[derive(Debug)]
pub struct DictionaryVerifier {
    users: BTreeMap<String, String>,
    hasher: CredentialHasher,
}

impl DictionaryVerifier {
    /// Builds a verifier from usernames and precomputed PHC hashes.
    pub fn new(users: BTreeMap<String, String>) -> Result<Self, AuthError> {
        Ok(Self {
            users,
            hasher: CredentialHasher::new()?,
        })
    }

    /// Builds a verifier from plaintext passwords, hashing each one.
    pub fn from_plain<I, U, P>(users: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: AsRef<str>,
    {
        let hasher = CredentialHasher::new()?;
        let mut hashed = BTreeMap::new();
        for (username, password) in users {
            hashed.insert(username.into(), hasher.hash_password(password.as_ref())?);
        }
        Ok(Self {
            users: hashed,
            hasher,
        })
    }

    /// Number of users in the dictionary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when the dictionary holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for DictionaryVerifier {
    async fn verify(&self, credential: &Credential) -> Result<VerifiedIdentity, AuthError> {
        let hasher = self.hasher.clone();
        let stored_hash = self.users.get(&credential.username).cloned();
        let username = credential.username.clone();
        let password = credential.password.clone();

        // Argon2 takes tens of milliseconds; keep it off the async runtime.
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify_password(&password, &hash),
            None => Ok(hasher.verify_dummy_password(&password)),
        })
        .await
        .map_err(|e| AuthError::unknown(format!("verifier task failed: {e}")))??;

        if verified {
            Ok(VerifiedIdentity::new(&credential.username))
        } else {
            tracing::debug!(
                target: TRACING_TARGET_VERIFY,
                username = %username,
                "dictionary verification failed"
            );
            Err(AuthError::InvalidCredential)
        }
    }
}
