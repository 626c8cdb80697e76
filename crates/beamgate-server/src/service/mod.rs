//! Shared application state.

mod service_state;

pub use crate::service::service_state::ServiceState;
