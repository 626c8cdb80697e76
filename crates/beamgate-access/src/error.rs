//! Error types for authentication and access control.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Failures surfaced by the [`AccessService`](crate::AccessService).
///
/// Variants carry enough structure for the HTTP layer to pick a status
/// code without parsing messages.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The credential failed verification. Deliberately unspecific.
    #[error("invalid username, password, or token")]
    InvalidCredential,
    /// No provider is registered under the requested name.
    #[error("authentication provider '{name}' is not registered")]
    ProviderNotFound { name: String },
    /// The provider's backing service could not be reached in time.
    #[error("authentication provider '{name}' is unavailable: {reason}")]
    ProviderUnavailable { name: String, reason: String },
    /// A token or API key past its expiry, or a session past its lifetime.
    #[error("credential has expired")]
    TokenExpired,
    /// The session backing a refresh token was revoked.
    #[error("session {session_id} has been revoked")]
    SessionRevoked { session_id: Uuid },
    /// A requested scope exceeds what the requester may grant or hold.
    #[error("scope '{scope}' is not permitted")]
    ScopeNotPermitted { scope: String },
    /// The access store failed.
    #[error("access store failure: {reason}")]
    Store { reason: String },
    /// Anything that does not fit the variants above.
    #[error("authentication failed: {reason}")]
    Unknown { reason: String },
}

impl AuthError {
    /// Creates a [`AuthError::ProviderNotFound`] error.
    pub fn provider_not_found(name: impl Into<String>) -> Self {
        Self::ProviderNotFound { name: name.into() }
    }

    /// Creates a [`AuthError::ProviderUnavailable`] error.
    pub fn provider_unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`AuthError::SessionRevoked`] error.
    pub fn session_revoked(session_id: Uuid) -> Self {
        Self::SessionRevoked { session_id }
    }

    /// Creates a [`AuthError::ScopeNotPermitted`] error.
    pub fn scope_not_permitted(scope: impl Into<String>) -> Self {
        Self::ScopeNotPermitted {
            scope: scope.into(),
        }
    }

    /// Creates a [`AuthError::Store`] error.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    /// Creates a [`AuthError::Unknown`] error.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for error bodies and logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::ProviderNotFound { .. } => "provider_not_found",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::TokenExpired => "token_expired",
            Self::SessionRevoked { .. } => "session_revoked",
            Self::ScopeNotPermitted { .. } => "scope_not_permitted",
            Self::Store { .. } => "store_failure",
            Self::Unknown { .. } => "unknown",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        Self::store(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::InvalidCredential,
            _ => Self::unknown(error.to_string()),
        }
    }
}
