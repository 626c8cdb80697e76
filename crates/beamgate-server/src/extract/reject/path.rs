//! Path parameter extractor with improved error handling.

use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequestParts, Path as AxumPath};
use axum::http::request::Parts;
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;

use crate::handler::{Error, ErrorKind};

/// Path extractor that rejects through the gateway error surface.
///
/// [`Path`]: AxumPath
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Path<T>(pub T);

impl<T> Path<T> {
    /// Returns the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let extractor = <AxumPath<T> as FromRequestParts<S>>::from_request_parts(parts, state);
        extractor.await.map(|x| Self(x.0)).map_err(Into::into)
    }
}

impl From<PathRejection> for Error<'static> {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => ErrorKind::BadRequest
                .with_message("Path parameter has the wrong shape.")
                .with_context(err.to_string()),
            PathRejection::MissingPathParams(err) => {
                ErrorKind::MissingPathParam.with_context(err.to_string())
            }
            _ => ErrorKind::InternalServerError
                .with_context(format!("unexpected path rejection: {rejection:?}")),
        }
        .into_static()
    }
}
