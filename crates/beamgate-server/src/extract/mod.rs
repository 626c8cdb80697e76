//! HTTP request extractors.
//!
//! [`AuthPrincipal`] resolves the bearer credential of a request into a
//! [`Principal`] exactly once, caching the result in the request
//! extensions. The [`reject`] wrappers are drop-in replacements for the
//! stock axum extractors that render their rejections through the
//! gateway's error surface instead of plain-text bodies.
//!
//! [`Principal`]: beamgate_core::Principal

mod auth_principal;
pub mod reject;

pub use self::auth_principal::AuthPrincipal;
pub use self::reject::{Form, Json, Path, Query};
