//! Role-based login authorization.

use std::collections::HashSet;

use crate::config::AuthConfig;

/// Outcome of the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub is_admin: bool,
}

/// Login acceptance policy: an accepted-role list and an optional admin role.
#[derive(Debug, Clone)]
pub struct AuthzPolicy {
    accepted_roles: HashSet<String>,
    admin_role: Option<String>,
}

impl AuthzPolicy {
    pub fn new(accepted_roles: HashSet<String>, admin_role: Option<String>) -> Self {
        Self {
            accepted_roles,
            admin_role,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.accepted_roles.clone(), config.admin_role.clone())
    }

    /// Decide login acceptance from an extracted role set.
    ///
    /// An empty accepted-role list accepts every authenticated principal.
    /// This open-door default is deliberate and covered by tests; deployments
    /// restrict logins by configuring at least one accepted role.
    pub fn authorize(&self, roles: &HashSet<String>) -> Decision {
        let allowed =
            self.accepted_roles.is_empty() || !self.accepted_roles.is_disjoint(roles);

        let is_admin = self
            .admin_role
            .as_ref()
            .map(|r| roles.contains(r))
            .unwrap_or(false);

        Decision { allowed, is_admin }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_accepted_roles_is_open() {
        let policy = AuthzPolicy::new(HashSet::new(), Some("swan-admins".to_string()));

        let decision = policy.authorize(&roles(&["anything"]));
        assert!(decision.allowed);

        let decision = policy.authorize(&HashSet::new());
        assert!(decision.allowed);
        assert!(!decision.is_admin);
    }

    #[test]
    fn test_intersection_grants_login() {
        let policy = AuthzPolicy::new(roles(&["users", "staff"]), None);

        assert!(policy.authorize(&roles(&["users"])).allowed);
        assert!(policy.authorize(&roles(&["staff", "other"])).allowed);
        assert!(!policy.authorize(&roles(&["other"])).allowed);
        assert!(!policy.authorize(&HashSet::new()).allowed);
    }

    #[test]
    fn test_admin_flag() {
        // Scenario: roles {swan-admins, users}, admin_role swan-admins,
        // empty accepted list: allowed and admin.
        let policy = AuthzPolicy::new(HashSet::new(), Some("swan-admins".to_string()));
        let decision = policy.authorize(&roles(&["swan-admins", "users"]));
        assert!(decision.allowed);
        assert!(decision.is_admin);

        let decision = policy.authorize(&roles(&["users"]));
        assert!(!decision.is_admin);
    }

    #[test]
    fn test_no_admin_role_configured() {
        let policy = AuthzPolicy::new(HashSet::new(), None);
        let decision = policy.authorize(&roles(&["swan-admins"]));
        assert!(!decision.is_admin);
    }
}
