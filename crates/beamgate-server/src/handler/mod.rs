//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust
//! use beamgate_server::handler::routes;
//! use beamgate_server::service::ServiceState;
//!
//! # fn example(state: ServiceState) {
//! let app: axum::Router = routes().with_state(state);
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod authentication;
mod error;
mod forwarding;
mod principals;
mod response;

use axum::Router;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with every gateway route.
///
/// Authentication and principal administration live under `/auth`;
/// everything else relays to the manager.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(authentication::routes())
        .merge(principals::routes())
        .merge(forwarding::routes())
        .fallback(handler)
}
