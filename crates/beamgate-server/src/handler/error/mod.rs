//! Error surface of the HTTP handlers.

mod http_error;

pub use self::http_error::{Error, ErrorKind, Result};
