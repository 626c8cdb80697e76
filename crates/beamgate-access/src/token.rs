//! HS256 token signing and verification with key rotation.
//!
//! The signer holds an ordered list of secrets. The first one signs new
//! tokens, every one of them may still verify, so rotating a secret means
//! prepending the new one and keeping the old ones around until every
//! outstanding token has expired.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beamgate_core::{Principal, Scope, ScopeSet};

use crate::TRACING_TARGET_TOKEN;
use crate::error::AuthError;

/// `typ` claim value carried by access tokens.
pub const TOKEN_TYPE_ACCESS: &str = "access";
/// `typ` claim value carried by refresh tokens.
pub const TOKEN_TYPE_REFRESH: &str = "refresh";
/// `sub_typ` claim value for user principals.
pub const SUBJECT_USER: &str = "user";

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (principal id).
    #[serde(rename = "sub")]
    pub principal_id: Uuid,
    /// Subject type discriminator.
    #[serde(rename = "sub_typ")]
    pub subject_type: String,
    /// Granted scopes, space-separated.
    #[serde(rename = "scp")]
    pub scopes: String,
    /// Token type discriminator, always [`TOKEN_TYPE_ACCESS`].
    #[serde(rename = "typ")]
    pub token_type: String,
    /// Issued at (UNIX seconds).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiration time (UNIX seconds).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl AccessClaims {
    /// Granted scopes as a set.
    #[must_use]
    pub fn scope_set(&self) -> ScopeSet {
        self.scopes.split_whitespace().map(Scope::from).collect()
    }

    /// Whether the expiration instant has passed.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Timestamp::now().as_second()
    }
}

/// Claims carried by a long-lived refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Session this token renews.
    #[serde(rename = "sid")]
    pub session_id: Uuid,
    /// Subject (principal id).
    #[serde(rename = "sub")]
    pub principal_id: Uuid,
    /// Token type discriminator, always [`TOKEN_TYPE_REFRESH`].
    #[serde(rename = "typ")]
    pub token_type: String,
    /// Issued at (UNIX seconds).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiration time (UNIX seconds).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// The instant `max_age` after `now`, saturating at the far future.
pub(crate) fn deadline_after(now: Timestamp, max_age: Duration) -> Timestamp {
    let span = SignedDuration::try_from(max_age).unwrap_or(SignedDuration::MAX);
    now.checked_add(span).unwrap_or(Timestamp::MAX)
}

/// Signs and verifies tokens against a rotation list of shared secrets.
#[derive(Clone)]
pub struct TokenSigner {
    keys: Arc<Vec<SigningKey>>,
}

/// One HS256 secret in both directions.
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    /// Creates a signer from an ordered list of secrets.
    ///
    /// The first secret signs new tokens. At least one is required.
    pub fn new<I, S>(secrets: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let keys: Vec<SigningKey> = secrets
            .into_iter()
            .map(|secret| {
                let secret = secret.as_ref();
                SigningKey {
                    encoding: EncodingKey::from_secret(secret),
                    decoding: DecodingKey::from_secret(secret),
                }
            })
            .collect();

        if keys.is_empty() {
            return Err(AuthError::unknown(
                "token signer requires at least one signing secret",
            ));
        }

        Ok(Self {
            keys: Arc::new(keys),
        })
    }

    /// Number of secrets in the rotation list.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Signs an access token for the given principal.
    ///
    /// The granted scopes are frozen into the token. Policy changes made
    /// after signing do not affect it until it is reissued.
    pub fn sign_access(
        &self,
        principal: &Principal,
        now: Timestamp,
        max_age: Duration,
    ) -> Result<String, AuthError> {
        let scopes = principal
            .scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let claims = AccessClaims {
            principal_id: principal.id,
            subject_type: SUBJECT_USER.to_owned(),
            scopes,
            token_type: TOKEN_TYPE_ACCESS.to_owned(),
            issued_at: now.as_second(),
            expires_at: deadline_after(now, max_age).as_second(),
        };
        self.sign(&claims)
    }

    /// Signs a refresh token bound to the given session.
    pub fn sign_refresh(
        &self,
        session_id: Uuid,
        principal_id: Uuid,
        now: Timestamp,
        max_age: Duration,
    ) -> Result<String, AuthError> {
        let claims = RefreshClaims {
            session_id,
            principal_id,
            token_type: TOKEN_TYPE_REFRESH.to_owned(),
            issued_at: now.as_second(),
            expires_at: deadline_after(now, max_age).as_second(),
        };
        self.sign(&claims)
    }

    /// Decodes and validates a token against every key in the rotation list.
    ///
    /// An expired signature still verified against its key, so later keys
    /// cannot rescue the token and expiry is reported immediately.
    pub fn decode<T>(&self, token: &str) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
    {
        let validation = Self::validation();
        let mut last_error = AuthError::InvalidCredential;

        for key in self.keys.iter() {
            match decode::<T>(token, &key.decoding, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(error) => {
                    if matches!(error.kind(), JwtErrorKind::ExpiredSignature) {
                        return Err(AuthError::TokenExpired);
                    }
                    last_error = error.into();
                }
            }
        }

        Err(last_error)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        let Some(key) = self.keys.first() else {
            return Err(AuthError::unknown("token signer has no signing keys"));
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &key.encoding).map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_TOKEN,
                error = %e,
                "failed to encode token",
            );
            AuthError::unknown("token encoding failed")
        })
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Tokens carry no audience claim.
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}
