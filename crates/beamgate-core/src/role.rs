//! Built-in roles and their default scope grants.

use std::collections::BTreeMap;

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::scope::{ScopeSet, scope_set, scopes as s};

/// Roles the gateway knows without any configuration.
///
/// The names serialize in `snake_case`, matching the role names accepted
/// by policy documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinRole {
    /// Account and instance administration, no experiment control.
    Admin,
    /// Full experiment control, including permission and script editing.
    Expert,
    /// Experiment control without configuration editing.
    Advanced,
    /// Alias for [`BuiltinRole::Advanced`].
    User,
    /// Read-only visibility into the manager.
    Observer,
    /// Role assumed by the single-user API key.
    UnauthenticatedSingleUser,
    /// Role assumed by credential-less requests in anonymous mode.
    UnauthenticatedPublic,
}

impl BuiltinRole {
    /// Scopes granted to this role by default.
    #[must_use]
    pub fn default_scopes(self) -> ScopeSet {
        match self {
            Self::Admin => scope_set([
                s::READ_STATUS,
                s::USER_APIKEYS,
                s::ADMIN_APIKEYS,
                s::ADMIN_READ_PRINCIPALS,
                s::ADMIN_METRICS,
            ]),
            Self::Expert => {
                let mut set = Self::Advanced.default_scopes();
                set.extend(scope_set([
                    s::WRITE_PERMISSIONS,
                    s::WRITE_SCRIPTS,
                    s::WRITE_CONFIG,
                    s::WRITE_LOCK,
                    s::USER_APIKEYS,
                ]));
                set
            }
            Self::Advanced | Self::User => {
                let mut set = Self::Observer.default_scopes();
                set.extend(scope_set([
                    s::WRITE_QUEUE_EDIT,
                    s::WRITE_QUEUE_CONTROL,
                    s::WRITE_MANAGER_CONTROL,
                    s::WRITE_PLAN_CONTROL,
                    s::WRITE_EXECUTE,
                    s::WRITE_HISTORY_EDIT,
                ]));
                set
            }
            Self::Observer => scope_set([
                s::READ_STATUS,
                s::READ_QUEUE,
                s::READ_HISTORY,
                s::READ_RESOURCES,
                s::READ_CONFIG,
                s::READ_MONITOR,
                s::READ_CONSOLE,
                s::READ_LOCK,
                s::READ_TESTING,
            ]),
            Self::UnauthenticatedSingleUser => {
                let mut set = Self::Expert.default_scopes();
                set.extend(scope_set([s::WRITE_MANAGER_STOP, s::WRITE_TESTING]));
                set
            }
            Self::UnauthenticatedPublic => scope_set([s::READ_STATUS]),
        }
    }
}

/// The complete built-in role table, keyed by role name.
#[must_use]
pub fn builtin_role_table() -> BTreeMap<String, ScopeSet> {
    BuiltinRole::iter()
        .map(|role| (role.to_string(), role.default_scopes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_serialize_snake_case() {
        assert_eq!(BuiltinRole::Admin.to_string(), "admin");
        assert_eq!(
            BuiltinRole::UnauthenticatedSingleUser.to_string(),
            "unauthenticated_single_user"
        );
        assert_eq!("expert".parse::<BuiltinRole>().unwrap(), BuiltinRole::Expert);
    }

    #[test]
    fn user_matches_advanced() {
        assert_eq!(
            BuiltinRole::User.default_scopes(),
            BuiltinRole::Advanced.default_scopes()
        );
    }

    #[test]
    fn expert_extends_advanced() {
        let advanced = BuiltinRole::Advanced.default_scopes();
        let expert = BuiltinRole::Expert.default_scopes();
        assert!(expert.is_superset(&advanced));
        assert!(expert.contains(s::WRITE_PERMISSIONS));
        assert!(!advanced.contains(s::WRITE_PERMISSIONS));
    }

    #[test]
    fn admin_has_no_experiment_control() {
        let admin = BuiltinRole::Admin.default_scopes();
        assert!(admin.contains(s::ADMIN_APIKEYS));
        assert!(admin.contains(s::READ_STATUS));
        assert!(!admin.contains(s::WRITE_QUEUE_EDIT));
        assert!(!admin.contains(s::READ_QUEUE));
    }

    #[test]
    fn single_user_mode_gets_manager_stop() {
        let single = BuiltinRole::UnauthenticatedSingleUser.default_scopes();
        assert!(single.is_superset(&BuiltinRole::Expert.default_scopes()));
        assert!(single.contains(s::WRITE_MANAGER_STOP));
        assert!(single.contains(s::WRITE_TESTING));
        assert!(single.contains(s::USER_APIKEYS));
    }

    #[test]
    fn public_mode_is_status_only() {
        let public = BuiltinRole::UnauthenticatedPublic.default_scopes();
        assert_eq!(public.len(), 1);
        assert!(public.contains(s::READ_STATUS));
    }

    #[test]
    fn table_covers_every_role() {
        let table = builtin_role_table();
        assert_eq!(table.len(), 7);
        assert!(table.contains_key("observer"));
        assert!(table.contains_key("unauthenticated_public"));
    }
}
