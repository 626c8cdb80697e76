//! Argon2id password hashing for the dictionary verifier.

use argon2::password_hash::{Error as ArgonError, SaltString};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
};
use rand::rngs::OsRng;

use crate::TRACING_TARGET_VERIFY;
use crate::error::AuthError;

/// Argon2id hasher with OWASP recommended parameters.
///
/// - Memory cost: 19456 KiB
/// - Time cost: 2 iterations
/// - Parallelism: 1 thread
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Creates a hasher with the fixed parameter set.
    pub fn new() -> Result<Self, AuthError> {
        let params = Params::new(19456, 2, 1, None).map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_VERIFY,
                error = %e,
                "failed to create argon2 parameters"
            );
            AuthError::unknown("invalid password hashing configuration")
        })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    /// Hashes a password into PHC string format with a random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::try_from_rng(&mut OsRng).map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_VERIFY,
                error = %e,
                "failed to generate password salt"
            );
            AuthError::unknown("salt generation failed")
        })?;

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_VERIFY,
                    error = %e,
                    "password hashing operation failed"
                );
                AuthError::unknown("password hashing failed")
            })?;

        Ok(password_hash.to_string())
    }

    /// Verifies a password against a stored PHC hash.
    ///
    /// Returns `Ok(false)` for a wrong password; errors are reserved for
    /// malformed hashes and system failures.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
            tracing::warn!(
                target: TRACING_TARGET_VERIFY,
                error = %e,
                "stored password hash has an invalid format"
            );
            AuthError::unknown("stored hash format error")
        })?;

        match self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(ArgonError::Password) => Ok(false),
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_VERIFY,
                    error = %e,
                    "password verification system error"
                );
                Err(AuthError::unknown("password verification failed"))
            }
        }
    }

    /// Burns one full hash-and-verify cycle against a random throwaway
    /// password.
    ///
    /// Called when a username is unknown so a missing account costs the
    /// same time as a wrong password.
    pub fn verify_dummy_password(&self, password: &str) -> bool {
        use rand::Rng;

        let password_len = rand::random_range(16..32);
        let dummy_password: String = (0..password_len)
            .map(|_| rand::rng().sample(rand::distr::Alphanumeric) as char)
            .collect();

        if let Ok(dummy_hash) = self.hash_password(&dummy_password) {
            let _ = self.verify_password(password, &dummy_hash);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_password() -> anyhow::Result<()> {
        let hasher = CredentialHasher::new()?;
        let hash = hasher.hash_password("secure_password_123")?;

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("secure_password_123", &hash)?);
        assert!(!hasher.verify_password("wrong_password", &hash)?);

        Ok(())
    }

    #[test]
    fn hash_produces_unique_salts() -> anyhow::Result<()> {
        let hasher = CredentialHasher::new()?;

        let hash1 = hasher.hash_password("test_password")?;
        let hash2 = hasher.hash_password("test_password")?;

        assert_ne!(hash1, hash2);
        assert!(hasher.verify_password("test_password", &hash1)?);
        assert!(hasher.verify_password("test_password", &hash2)?);

        Ok(())
    }

    #[test]
    fn invalid_hash_format_is_an_error() -> anyhow::Result<()> {
        let hasher = CredentialHasher::new()?;
        let result = hasher.verify_password("test_password", "not_a_phc_hash");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn dummy_verification_always_fails() -> anyhow::Result<()> {
        let hasher = CredentialHasher::new()?;
        assert!(!hasher.verify_dummy_password("any_password"));
        Ok(())
    }
}
