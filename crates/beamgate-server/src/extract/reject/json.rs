//! JSON extractor with improved error handling.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Json as AxumJson, OptionalFromRequest, Request};
use axum::response::{IntoResponse, Response};
use derive_more::{Deref, DerefMut, From};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::handler::{Error, ErrorKind};

/// JSON extractor that rejects through the gateway error surface.
///
/// Behaves like `axum::`[`Json`] except that deserialization and
/// content-type failures render as the gateway's JSON error body. The
/// optional form yields `None` when the request never claimed to carry
/// JSON, which is what lets forwarded endpoints take an omitted body; a
/// body that does claim to be JSON and fails to parse still rejects.
///
/// [`Json`]: AxumJson
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Creates a new [`Json`] wrapper around the provided value.
    #[inline]
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Returns the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extractor = <AxumJson<T> as FromRequest<S>>::from_request(req, state).await;
        extractor.map(|x| Self::new(x.0)).map_err(Into::into)
    }
}

impl<T, S> OptionalFromRequest<S> for Json<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        match <AxumJson<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(AxumJson(value)) => Ok(Some(Self(value))),
            // A request that never claimed to carry JSON has no payload.
            Err(JsonRejection::MissingJsonContentType(_)) => Ok(None),
            Err(rejection) => Err(rejection.into()),
        }
    }
}

impl<T> IntoResponse for Json<T>
where
    T: Serialize,
{
    #[inline]
    fn into_response(self) -> Response {
        AxumJson(self.0).into_response()
    }
}

impl From<JsonRejection> for Error<'static> {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => ErrorKind::BadRequest
                .with_message("Request data does not match the expected shape.")
                .with_context(sanitize_error_message(&err.to_string())),
            JsonRejection::JsonSyntaxError(err) => ErrorKind::BadRequest
                .with_message("Request body is not well-formed JSON.")
                .with_context(sanitize_error_message(&err.to_string())),
            JsonRejection::MissingJsonContentType(_) => ErrorKind::BadRequest
                .with_message("Content-Type header must be 'application/json'."),
            JsonRejection::BytesRejection(err) => {
                let message = err.to_string();
                if message.contains("length limit") {
                    ErrorKind::PayloadTooLarge.into_error()
                } else {
                    ErrorKind::BadRequest
                        .with_message("Failed to read the request body.")
                        .with_context(sanitize_error_message(&message))
                }
            }
            _ => ErrorKind::InternalServerError
                .with_context(format!("unexpected JSON rejection: {rejection:?}")),
        }
        .into_static()
    }
}

/// Trims rejection details to something loggable without leaking payloads.
fn sanitize_error_message(message: &str) -> String {
    let lines = message.lines().take(3).collect::<Vec<_>>();
    lines.join(" ").chars().take(200).collect()
}
