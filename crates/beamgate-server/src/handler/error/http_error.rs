//! HTTP error handling with builder pattern for dynamic error responses.
//!
//! [`ErrorKind`] names every failure the gateway reports; [`Error`] adds
//! per-occurrence message, resource, and context on top of the const
//! [`ErrorResponse`] presets. Domain errors from the access and dispatch
//! crates convert into this type at the handler boundary.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use beamgate_access::AuthError;
use beamgate_dispatch::DispatchError;

use crate::handler::response::ErrorResponse;

/// Tracing target for domain-to-HTTP error conversion.
const TRACING_TARGET: &str = "beamgate_server::handler::error";

/// The error type for HTTP handlers in the gateway.
#[derive(Clone)]
#[must_use = "errors do nothing unless serialized"]
pub struct Error<'a> {
    kind: ErrorKind,
    context: Option<Cow<'a, str>>,
    message: Option<Cow<'a, str>>,
    resource: Option<Cow<'a, str>>,
}

impl Error<'static> {
    /// Creates a new [`Error`] with the specified kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            message: None,
            resource: None,
        }
    }
}

impl<'a> Error<'a> {
    /// Attaches context information to the error.
    ///
    /// Context is logged alongside the response but never serialized
    /// into the body.
    #[inline]
    pub fn with_context(self, context: impl Into<Cow<'a, str>>) -> Self {
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    /// Sets a custom client-facing message for the error.
    #[inline]
    pub fn with_message(self, message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }

    /// Sets the resource that caused the error.
    #[inline]
    pub fn with_resource(self, resource: impl Into<Cow<'a, str>>) -> Self {
        Self {
            resource: Some(resource.into()),
            ..self
        }
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context if present.
    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the custom message if present.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the resource if present.
    #[inline]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Converts this error into a static version by cloning all borrowed data.
    pub fn into_static(self) -> Error<'static> {
        Error {
            kind: self.kind,
            context: self.context.map(|c| Cow::Owned(c.into_owned())),
            message: self.message.map(|m| Cow::Owned(m.into_owned())),
            resource: self.resource.map(|r| Cow::Owned(r.into_owned())),
        }
    }
}

impl Default for Error<'static> {
    #[inline]
    fn default() -> Self {
        Self::new(ErrorKind::default())
    }
}

impl fmt::Debug for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();

        let mut debug_struct = f.debug_struct("Error");
        debug_struct
            .field("kind", &self.kind)
            .field("name", &response.name)
            .field("status", &response.status);

        if let Some(ref context) = self.context {
            debug_struct.field("context", context);
        }

        if let Some(ref message) = self.message {
            debug_struct.field("message", message);
        }

        if let Some(ref resource) = self.resource {
            debug_struct.field("resource", resource);
        }

        debug_struct.finish()
    }
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();
        let message = self.message.as_deref().unwrap_or(&response.message);

        write!(f, "{} ({}): {}", response.name, response.status, message)?;

        if let Some(ref context) = self.context {
            write!(f, " - {}", context)?;
        }

        if let Some(ref resource) = self.resource {
            write!(f, " [resource: {}]", resource)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error<'_> {}

impl IntoResponse for Error<'_> {
    fn into_response(self) -> Response {
        let mut response = self.kind.response();

        if let Some(message) = self.message {
            response = response.with_message(message);
        }

        if let Some(resource) = self.resource {
            response = response.with_resource(resource);
        }

        if let Some(context) = self.context {
            response = response.with_context(context);
        }

        response.into_response()
    }
}

impl From<ErrorKind> for Error<'static> {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// A specialized [`Result`] type for HTTP operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error<'static>> = std::result::Result<T, E>;

/// Enumeration of all HTTP error kinds the gateway reports.
///
/// Each variant corresponds to one [`ErrorResponse`] preset and its
/// HTTP status code.
#[must_use = "error kinds do nothing unless used to create errors"]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // 4xx Client Errors
    /// 400 Bad Request - Missing required path parameter
    MissingPathParam,
    /// 400 Bad Request - Invalid request data
    BadRequest,
    /// 400 Bad Request - The manager reported an application failure
    RemoteError,
    /// 401 Unauthorized - Missing authentication token
    MissingAuthToken,
    /// 401 Unauthorized - Malformed authentication token
    MalformedAuthToken,
    /// 401 Unauthorized - Invalid credentials
    Unauthorized,
    /// 401 Unauthorized - Expired token, key, or session
    TokenExpired,
    /// 403 Forbidden - A required scope is missing
    Forbidden,
    /// 404 Not Found - Resource not found
    NotFound,
    /// 413 Payload Too Large - Request body over the limit
    PayloadTooLarge,

    // 5xx Server Errors
    /// 500 Internal Server Error - Unexpected server error
    #[default]
    InternalServerError,
    /// 503 Service Unavailable - Manager transport down or queue full
    ServiceUnavailable,
    /// 504 Gateway Timeout - The manager did not reply in time
    GatewayTimeout,
}

impl ErrorKind {
    /// Converts this error kind into a full [`Error`].
    #[inline]
    pub fn into_error(self) -> Error<'static> {
        Error::new(self)
    }

    /// Creates an [`Error`] with the specified context.
    #[inline]
    pub fn with_context<'a>(self, context: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_context(context)
    }

    /// Creates an [`Error`] with the specified message.
    #[inline]
    pub fn with_message<'a>(self, message: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_message(message)
    }

    /// Creates an [`Error`] with the specified resource.
    #[inline]
    pub fn with_resource<'a>(self, resource: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_resource(resource)
    }

    /// Returns the HTTP status code for this error kind.
    #[inline]
    pub fn status_code(self) -> StatusCode {
        self.response().status
    }

    /// Returns the response preset of this error kind.
    #[inline]
    pub fn response(self) -> ErrorResponse<'static> {
        match self {
            Self::MissingPathParam => ErrorResponse::MISSING_PATH_PARAM,
            Self::BadRequest => ErrorResponse::BAD_REQUEST,
            Self::RemoteError => ErrorResponse::REMOTE_ERROR,
            Self::MissingAuthToken => ErrorResponse::MISSING_AUTH_TOKEN,
            Self::MalformedAuthToken => ErrorResponse::MALFORMED_AUTH_TOKEN,
            Self::Unauthorized => ErrorResponse::UNAUTHORIZED,
            Self::TokenExpired => ErrorResponse::TOKEN_EXPIRED,
            Self::Forbidden => ErrorResponse::FORBIDDEN,
            Self::NotFound => ErrorResponse::NOT_FOUND,
            Self::PayloadTooLarge => ErrorResponse::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => ErrorResponse::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => ErrorResponse::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout => ErrorResponse::GATEWAY_TIMEOUT,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.response().name.as_ref())
    }
}

impl IntoResponse for ErrorKind {
    #[inline]
    fn into_response(self) -> Response {
        self.response().into_response()
    }
}

impl From<AuthError> for Error<'static> {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredential => ErrorKind::Unauthorized.into_error(),
            AuthError::ProviderNotFound { name } => ErrorKind::NotFound
                .with_message(format!("Authentication provider '{name}' is not registered."))
                .with_resource("provider")
                .into_static(),
            AuthError::ProviderUnavailable { name, reason } => ErrorKind::ServiceUnavailable
                .with_message(format!("Authentication provider '{name}' is unavailable."))
                .with_context(reason)
                .into_static(),
            AuthError::TokenExpired => ErrorKind::TokenExpired.into_error(),
            AuthError::SessionRevoked { session_id } => ErrorKind::Unauthorized
                .with_message("Session has been revoked.")
                .with_context(session_id.to_string())
                .into_static(),
            AuthError::ScopeNotPermitted { scope } => ErrorKind::Forbidden
                .with_message(format!("Scope '{scope}' is not permitted."))
                .into_static(),
            AuthError::Store { reason } => {
                ErrorKind::InternalServerError.with_context(reason).into_static()
            }
            AuthError::Unknown { reason } => {
                ErrorKind::InternalServerError.with_context(reason).into_static()
            }
        }
    }
}

impl From<DispatchError> for Error<'static> {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Busy => ErrorKind::ServiceUnavailable
                .with_message("The manager request queue is full, try again shortly.")
                .into_static(),
            DispatchError::Timeout { timeout } => ErrorKind::GatewayTimeout
                .with_context(format!("no manager reply within {timeout:?}"))
                .into_static(),
            DispatchError::TransportError { reason } => {
                // Auth routes keep serving while forwarding degrades, so a
                // dead transport is loud in the logs but a plain 503 to
                // the client.
                tracing::error!(
                    target: TRACING_TARGET,
                    reason = %reason,
                    "manager transport failure",
                );
                ErrorKind::ServiceUnavailable
                    .with_message("The manager connection is unavailable.")
                    .with_context(reason)
                    .into_static()
            }
            DispatchError::RemoteError { message } => {
                ErrorKind::RemoteError.with_message(message).into_static()
            }
        }
    }
}
