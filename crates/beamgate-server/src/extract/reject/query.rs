//! Query string extractor with improved error handling.

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query as AxumQuery};
use axum::http::request::Parts;
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;

use crate::handler::{Error, ErrorKind};

/// Query extractor that rejects through the gateway error surface.
///
/// [`Query`]: AxumQuery
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Query<T>(pub T);

impl<T> Query<T> {
    /// Returns the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let extractor = <AxumQuery<T> as FromRequestParts<S>>::from_request_parts(parts, state);
        extractor.await.map(|x| Self(x.0)).map_err(Into::into)
    }
}

impl From<QueryRejection> for Error<'static> {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::FailedToDeserializeQueryString(err) => ErrorKind::BadRequest
                .with_message("Query string has the wrong shape.")
                .with_context(err.to_string()),
            _ => ErrorKind::InternalServerError
                .with_context(format!("unexpected query rejection: {rejection:?}")),
        }
        .into_static()
    }
}
