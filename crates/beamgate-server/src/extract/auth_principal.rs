//! Bearer authentication resolved once per request.

use axum::RequestPartsExt;
use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use axum_extra::typed_header::TypedHeaderRejectionReason;
use derive_more::Deref;

use beamgate_access::AccessService;
use beamgate_core::Principal;

use crate::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};

/// Local alias for the bearer header extractor.
type AuthBearerHeader = TypedHeader<Authorization<Bearer>>;

/// The authenticated [`Principal`] of the current request.
///
/// Resolution order follows the access service: the configured
/// single-user key, an API key when the token has that shape, an access
/// token otherwise. A request without an `Authorization` header resolves
/// to the public principal when anonymous access is enabled and fails
/// with 401 when it is not.
///
/// The resolved principal is cached in the request extensions, so a
/// handler and its middlewares verify the credential at most once.
#[must_use]
#[derive(Debug, Clone, Deref)]
pub struct AuthPrincipal(pub Principal);

impl AuthPrincipal {
    /// Returns the inner [`Principal`].
    #[inline]
    pub fn into_inner(self) -> Principal {
        self.0
    }

    /// Fails with 403 unless the principal holds the named scope.
    pub fn require_scope(&self, scope: &str) -> Result<()> {
        if self.0.has_scope(scope) {
            return Ok(());
        }

        tracing::debug!(
            target: TRACING_TARGET_AUTHENTICATION,
            username = %self.0.username,
            scope,
            "scope check failed",
        );
        Err(ErrorKind::Forbidden
            .with_message(format!("Missing required scope '{scope}'."))
            .into_static())
    }
}

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
    AccessService: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(cached) = parts.extensions.get::<Self>() {
            return Ok(cached.clone());
        }

        let access = AccessService::from_ref(state);
        let bearer = match parts.extract::<AuthBearerHeader>().await {
            Ok(TypedHeader(Authorization(bearer))) => Some(bearer),
            Err(rejection) => match rejection.reason() {
                TypedHeaderRejectionReason::Missing => None,
                _ => return Err(ErrorKind::MalformedAuthToken.into_error()),
            },
        };

        let principal = match &bearer {
            Some(bearer) => access.validate_bearer(bearer.token()).await?,
            None if access.allows_anonymous() => access.anonymous_principal().await?,
            None => return Err(ErrorKind::MissingAuthToken.into_error()),
        };

        tracing::trace!(
            target: TRACING_TARGET_AUTHENTICATION,
            username = %principal.username,
            provider = %principal.provider,
            "principal resolved",
        );

        let principal = Self(principal);
        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
    AccessService: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Option<Self>> {
        match <Self as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(principal) => Ok(Some(principal)),
            Err(_) => Ok(None),
        }
    }
}
