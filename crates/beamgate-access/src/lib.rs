#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod apikey;
pub mod error;
pub mod service;
pub mod store;
pub mod token;
pub mod verify;

pub use crate::apikey::{ApiKeyRecord, ApiKeyScopes, ApiKeySecret};
pub use crate::error::AuthError;
pub use crate::service::{
    AccessConfig, AccessGrant, AccessService, ApiKeyRequest, IssuedApiKey, PrincipalOverview,
    TokenPair,
};
pub use crate::store::{AccessStore, MemoryStore, PrincipalRecord, SessionRecord, StoreError};
pub use crate::token::{AccessClaims, RefreshClaims, TokenSigner};
pub use crate::verify::{
    Credential, CredentialVerifier, DictionaryVerifier, DirectoryClient, DirectoryVerifier,
    ProviderConfig, ProviderRegistry, SharedSecretVerifier, VerifiedIdentity,
};

/// Tracing target for the access service.
pub const TRACING_TARGET_SERVICE: &str = "beamgate_access::service";
/// Tracing target for credential verification.
pub const TRACING_TARGET_VERIFY: &str = "beamgate_access::verify";
/// Tracing target for token signing and validation.
pub const TRACING_TARGET_TOKEN: &str = "beamgate_access::token";
/// Tracing target for the access store.
pub const TRACING_TARGET_STORE: &str = "beamgate_access::store";
