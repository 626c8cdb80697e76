//! Resolved request identities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeSet;

/// Provider name recorded for identities that never authenticated.
pub const ANONYMOUS_PROVIDER: &str = "__anonymous__";

/// Username assumed when the single-user API key is presented.
pub const SINGLE_USER_USERNAME: &str = "UNAUTHENTICATED_SINGLE_USER";

/// Username assumed for credential-less requests in anonymous mode.
pub const PUBLIC_USERNAME: &str = "UNAUTHENTICATED_PUBLIC";

/// A fully resolved identity for one request.
///
/// Principals are rebuilt per request from the stored identity record
/// and the active [`AccessPolicy`](crate::AccessPolicy); they are never
/// persisted themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Stable identifier of the stored identity record.
    pub id: Uuid,
    /// Authentication provider that verified this identity.
    pub provider: String,
    /// Username within the provider's namespace.
    pub username: String,
    /// Role names assigned by the policy, in policy order.
    pub roles: Vec<String>,
    /// Effective scopes for this request.
    pub scopes: ScopeSet,
    /// True when the credential pinned the scope set at issuance.
    #[serde(default, skip_serializing)]
    pub scopes_pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Principal {
    /// Whether this principal holds the named scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Display name when set, username otherwise.
    #[must_use]
    pub fn visible_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// First assigned role, recorded as the user group on forwarded items.
    #[must_use]
    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::scope_set;

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            provider: "toy".to_owned(),
            username: "bob".to_owned(),
            roles: vec!["observer".to_owned(), "admin".to_owned()],
            scopes: scope_set(["read:status", "read:queue"]),
            scopes_pinned: false,
            display_name: None,
            email: None,
        }
    }

    #[test]
    fn scope_membership() {
        let principal = principal();
        assert!(principal.has_scope("read:status"));
        assert!(!principal.has_scope("write:queue:edit"));
    }

    #[test]
    fn visible_name_prefers_display_name() {
        let mut principal = principal();
        assert_eq!(principal.visible_name(), "bob");
        principal.display_name = Some("Bob D.".to_owned());
        assert_eq!(principal.visible_name(), "Bob D.");
    }

    #[test]
    fn primary_role_is_first() {
        assert_eq!(principal().primary_role(), Some("observer"));
    }
}
