//! Middleware for `axum::Router` and HTTP request processing.
//!
//! Observability layers tag every request with an `x-request-id`,
//! redact credentials from logs and trace the request lifecycle.
//! The recovery layer converts handler panics into plain 500s.
//!
//! ```rust,no_run
//! use axum::Router;
//! use beamgate_server::middleware::RouterExt;
//!
//! let app: Router = Router::new()
//!     .with_recovery_layer()
//!     .with_observability_layer();
//! ```

use std::any::Any;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::TRACING_TARGET_RECOVERY;
use crate::handler::{Error, ErrorKind};

/// Maximum request body size: 2 MiB.
///
/// Forwarded payloads are queue items and permission documents, far
/// below the dispatcher's 16 MiB frame cap.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

type Panic = Box<dyn Any + Send + 'static>;

/// Creates a request ID layer generating unique UUID request IDs.
fn create_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(header::HeaderName::from_static("x-request-id"), MakeRequestUuid)
}

/// Creates a trace layer for HTTP logging.
fn create_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Creates a sensitive headers layer to redact auth info from logs.
fn create_sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new([header::AUTHORIZATION, header::COOKIE])
}

/// Creates a request ID propagation layer.
fn create_propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(header::HeaderName::from_static("x-request-id"))
}

/// Transforms any panic into an [`Error`] and then a [`Response`].
fn catch_panic(err: Panic) -> Response {
    if let Some(panic) = err.downcast_ref::<Error>() {
        tracing::error!(target: TRACING_TARGET_RECOVERY, "service panic: {}", panic);
    } else if let Some(panic) = err.downcast_ref::<String>() {
        tracing::error!(target: TRACING_TARGET_RECOVERY, "service panic: {}", panic);
    } else if let Some(panic) = err.downcast_ref::<&str>() {
        tracing::error!(target: TRACING_TARGET_RECOVERY, "service panic: {}", panic);
    } else {
        tracing::error!(target: TRACING_TARGET_RECOVERY, "service panic: unknown panic type");
    }

    ErrorKind::InternalServerError.into_response()
}

/// Extension trait for `axum::`[`Router`] for layering middleware.
pub trait RouterExt<S> {
    /// Layers [`SetRequestId`], [`Trace`] and [`PropagateRequestId`] middlewares.
    ///
    /// Generates a unique ID per request, traces the request lifecycle
    /// with `Authorization` and `Cookie` redacted, and echoes the ID
    /// back on the response.
    ///
    /// [`SetRequestId`]: tower_http::request_id::SetRequestIdLayer
    /// [`Trace`]: tower_http::trace::TraceLayer
    /// [`PropagateRequestId`]: tower_http::request_id::PropagateRequestIdLayer
    fn with_observability_layer(self) -> Self;

    /// Layers the [`CatchPanic`] middleware.
    ///
    /// Request deadlines are owned by the manager dispatcher, so no
    /// timeout layer is stacked here.
    ///
    /// [`CatchPanic`]: tower_http::catch_panic::CatchPanicLayer
    fn with_recovery_layer(self) -> Self;

    /// Layers the [`RequestBodyLimit`] middleware.
    ///
    /// Caps request bodies at [`MAX_BODY_SIZE`]; oversized payloads
    /// report as 413.
    ///
    /// [`RequestBodyLimit`]: tower_http::limit::RequestBodyLimitLayer
    fn with_body_limit_layer(self) -> Self;
}

impl<S> RouterExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability_layer(self) -> Self {
        // Apply layers in reverse order (last layer wraps first)
        self.layer(create_propagate_request_id_layer())
            .layer(create_sensitive_headers_layer())
            .layer(create_trace_layer())
            .layer(create_request_id_layer())
    }

    fn with_recovery_layer(self) -> Self {
        self.layer(CatchPanicLayer::custom(catch_panic))
    }

    fn with_body_limit_layer(self) -> Self {
        self.layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
    }
}
