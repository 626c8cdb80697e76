#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod policy;
pub mod principal;
pub mod role;
pub mod scope;

pub use crate::policy::{AccessPolicy, PolicyDocument, PolicyError, RoleOverride, UserEntry};
pub use crate::principal::{
    ANONYMOUS_PROVIDER, PUBLIC_USERNAME, Principal, SINGLE_USER_USERNAME,
};
pub use crate::role::BuiltinRole;
pub use crate::scope::{Scope, ScopeSet, scope_set, scopes};
