//! Named permission scopes and ordered scope sets.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scope names used by the built-in role table.
pub mod scopes {
    pub const READ_STATUS: &str = "read:status";
    pub const READ_QUEUE: &str = "read:queue";
    pub const READ_HISTORY: &str = "read:history";
    pub const READ_RESOURCES: &str = "read:resources";
    pub const READ_CONFIG: &str = "read:config";
    pub const READ_MONITOR: &str = "read:monitor";
    pub const READ_CONSOLE: &str = "read:console";
    pub const READ_LOCK: &str = "read:lock";
    pub const READ_TESTING: &str = "read:testing";

    pub const WRITE_QUEUE_EDIT: &str = "write:queue:edit";
    pub const WRITE_QUEUE_CONTROL: &str = "write:queue:control";
    pub const WRITE_MANAGER_CONTROL: &str = "write:manager:control";
    pub const WRITE_MANAGER_STOP: &str = "write:manager:stop";
    pub const WRITE_PLAN_CONTROL: &str = "write:plan:control";
    pub const WRITE_EXECUTE: &str = "write:execute";
    pub const WRITE_HISTORY_EDIT: &str = "write:history:edit";
    pub const WRITE_PERMISSIONS: &str = "write:permissions";
    pub const WRITE_SCRIPTS: &str = "write:scripts";
    pub const WRITE_CONFIG: &str = "write:config";
    pub const WRITE_LOCK: &str = "write:lock";
    pub const WRITE_TESTING: &str = "write:testing";

    pub const USER_APIKEYS: &str = "user:apikeys";
    pub const ADMIN_APIKEYS: &str = "admin:apikeys";
    pub const ADMIN_READ_PRINCIPALS: &str = "admin:read:principals";
    pub const ADMIN_METRICS: &str = "admin:metrics";
}

/// A single named permission, e.g. `write:queue:edit`.
///
/// Scopes are opaque names: holding a scope means exactly that the name
/// is present in the principal's set, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Creates a scope from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the scope name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Scope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `ScopeSet::contains` take a plain `&str`.
impl Borrow<str> for Scope {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An ordered, duplicate-free set of scopes.
pub type ScopeSet = BTreeSet<Scope>;

/// Builds a [`ScopeSet`] from anything yielding scope names.
pub fn scope_set<I, S>(names: I) -> ScopeSet
where
    I: IntoIterator<Item = S>,
    S: Into<Scope>,
{
    names.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_by_str() {
        let set = scope_set([scopes::READ_STATUS, scopes::WRITE_QUEUE_EDIT]);
        assert!(set.contains("read:status"));
        assert!(!set.contains("write:execute"));
    }

    #[test]
    fn serde_transparent() {
        let scope = Scope::new("read:queue");
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, r#""read:queue""#);

        let set: ScopeSet = serde_json::from_str(r#"["read:status", "read:queue"]"#).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn set_deduplicates() {
        let set = scope_set(["read:status", "read:status", "read:queue"]);
        assert_eq!(set.len(), 2);
    }
}
