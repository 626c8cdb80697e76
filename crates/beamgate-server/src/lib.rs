#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod extract;
pub mod handler;
pub mod middleware;
pub mod service;

pub use crate::handler::{Error, ErrorKind, Result, routes};
pub use crate::middleware::RouterExt;
pub use crate::service::ServiceState;

/// Tracing target for bearer authentication.
pub const TRACING_TARGET_AUTHENTICATION: &str = "beamgate_server::authentication";
/// Tracing target for panic and middleware recovery.
pub const TRACING_TARGET_RECOVERY: &str = "beamgate_server::recovery";

/// Assembles the complete gateway application.
///
/// All routes, the shared state, and the default middleware stack. The
/// result is ready to serve.
pub fn app(state: ServiceState) -> axum::Router {
    routes()
        .with_state(state)
        .with_body_limit_layer()
        .with_recovery_layer()
        .with_observability_layer()
}
