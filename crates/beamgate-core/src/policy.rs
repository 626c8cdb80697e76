//! Role-to-scope policy with per-user assignments and overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::role::builtin_role_table;
use crate::scope::ScopeSet;

/// Per-role adjustment applied on top of the built-in table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleOverride {
    /// Replaces the role's scope set entirely when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_set: Option<ScopeSet>,
    #[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
    pub scopes_add: ScopeSet,
    /// Scopes removed from the role. A removed scope stays absent from
    /// any role union that includes this role.
    #[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
    pub scopes_remove: ScopeSet,
}

/// One user's policy entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
    pub scopes_add: ScopeSet,
    #[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
    pub scopes_remove: ScopeSet,
}

/// Configuration form of the policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleOverride>,
    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,
}

/// Failures while building an [`AccessPolicy`].
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("user '{user}' references undefined role '{role}'")]
    UnknownRole { user: String, role: String },
    #[error("malformed policy document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The resolved role table plus per-user assignments.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    roles: BTreeMap<String, ScopeSet>,
    // Role-level removals, subtracted after the whole role union.
    removed: BTreeMap<String, ScopeSet>,
    users: BTreeMap<String, UserEntry>,
}

impl AccessPolicy {
    /// The built-in role table with no users assigned.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            roles: builtin_role_table(),
            removed: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }

    /// Builds a policy from a configuration document layered over the
    /// built-in role table.
    pub fn from_document(document: PolicyDocument) -> Result<Self, PolicyError> {
        let mut roles = builtin_role_table();
        let mut removed = BTreeMap::new();

        for (name, role_override) in document.roles {
            let base = roles.entry(name.clone()).or_default();
            if let Some(scopes) = role_override.scopes_set {
                *base = scopes;
            }
            base.extend(role_override.scopes_add);
            for scope in &role_override.scopes_remove {
                base.remove(scope);
            }
            if !role_override.scopes_remove.is_empty() {
                removed.insert(name, role_override.scopes_remove);
            }
        }

        for (user, entry) in &document.users {
            for role in &entry.roles {
                if !roles.contains_key(role) {
                    return Err(PolicyError::UnknownRole {
                        user: user.clone(),
                        role: role.clone(),
                    });
                }
            }
        }

        Ok(Self {
            roles,
            removed,
            users: document.users,
        })
    }

    /// Parses the JSON configuration form.
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = serde_json::from_str(raw)?;
        Self::from_document(document)
    }

    /// Replaces the whole policy in place.
    pub fn replace(&mut self, other: AccessPolicy) {
        *self = other;
    }

    /// Scopes granted by the union of the given roles.
    ///
    /// A scope removed by any of the roles' overrides stays absent no
    /// matter which other role in the set grants it, independent of
    /// iteration order.
    #[must_use]
    pub fn resolve<I, S>(&self, role_names: I) -> ScopeSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut granted = ScopeSet::new();
        let mut denied = ScopeSet::new();
        for name in role_names {
            let name = name.as_ref();
            if let Some(scopes) = self.roles.get(name) {
                granted.extend(scopes.iter().cloned());
            }
            if let Some(removes) = self.removed.get(name) {
                denied.extend(removes.iter().cloned());
            }
        }
        for scope in &denied {
            granted.remove(scope);
        }
        granted
    }

    /// The policy entry for one user, if any.
    #[must_use]
    pub fn user(&self, username: &str) -> Option<&UserEntry> {
        self.users.get(username)
    }

    /// Roles assigned to a user by this policy.
    #[must_use]
    pub fn roles_of(&self, username: &str) -> Vec<String> {
        self.users
            .get(username)
            .map(|entry| entry.roles.clone())
            .unwrap_or_default()
    }

    /// Effective scopes for a user: the role union, plus the user's
    /// additions, minus the user's removals. Removal always wins.
    #[must_use]
    pub fn effective_scopes(&self, username: &str, roles: &[String]) -> ScopeSet {
        let mut scopes = self.resolve(roles);
        if let Some(entry) = self.users.get(username) {
            scopes.extend(entry.scopes_add.iter().cloned());
            for scope in &entry.scopes_remove {
                scopes.remove(scope);
            }
        }
        scopes
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}
