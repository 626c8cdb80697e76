//! Response bodies shared across handlers.

mod errors;
mod identity;

pub use self::errors::ErrorResponse;
pub use self::identity::{
    ApiKeyCreatedResponse, ApiKeySummary, PrincipalSummary, SessionSummary,
};
