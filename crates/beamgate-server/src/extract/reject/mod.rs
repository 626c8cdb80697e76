//! Request extractors with gateway error bodies.
//!
//! Drop-in replacements for the stock axum extractors whose rejections
//! serialize through the gateway's [`Error`](crate::handler::Error)
//! surface instead of plain text, keeping every failure the client sees
//! in one shape.

mod form;
mod json;
mod path;
mod query;

pub use self::form::Form;
pub use self::json::Json;
pub use self::path::Path;
pub use self::query::Query;
