//! Form data extractor with improved error handling.

use axum::extract::rejection::FormRejection;
use axum::extract::{Form as AxumForm, FromRequest, OptionalFromRequest, Request};
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;

use crate::handler::{Error, ErrorKind};

/// Form extractor that rejects through the gateway error surface.
///
/// Expects `application/x-www-form-urlencoded` bodies and reports
/// missing or malformed fields with enough context to fix the request.
///
/// [`Form`]: AxumForm
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Form<T>(pub T);

impl<T> Form<T> {
    /// Creates a new [`Form`] wrapper around the provided value.
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

impl<T, S> FromRequest<S> for Form<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extractor = <AxumForm<T> as FromRequest<S>>::from_request(req, state);
        extractor.await.map(|x| Self(x.0)).map_err(Into::into)
    }
}

impl<T, S> OptionalFromRequest<S> for Form<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        match <AxumForm<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(AxumForm(form)) => Ok(Some(Self(form))),
            Err(_) => Ok(None),
        }
    }
}

impl From<FormRejection> for Error<'static> {
    fn from(rejection: FormRejection) -> Self {
        match rejection {
            FormRejection::FailedToDeserializeForm(err) => ErrorKind::BadRequest
                .with_message("Form data does not match the expected shape.")
                .with_context(err.to_string()),
            FormRejection::FailedToDeserializeFormBody(err) => ErrorKind::BadRequest
                .with_message("Form data does not match the expected shape.")
                .with_context(err.to_string()),
            FormRejection::InvalidFormContentType(_) => ErrorKind::BadRequest
                .with_message("Content-Type header must be 'application/x-www-form-urlencoded'."),
            FormRejection::BytesRejection(err) => ErrorKind::BadRequest
                .with_message("Request body could not be read.")
                .with_context(err.to_string()),
            _ => ErrorKind::InternalServerError
                .with_context(format!("unexpected form rejection: {rejection:?}")),
        }
        .into_static()
    }
}
