//! Role-based visibility scoping for index queries.
//!
//! Every stored record carries an `access_group` tag derived from the
//! corpus folder it came from. A query made on behalf of a role may see
//! a record when the record's tag equals the role name, or when the tag
//! is the universal [`GENERAL_GROUP`]. The rule is expressed once, here,
//! as a typed predicate that index implementations evaluate before any
//! ranking truncation.

/// The sentinel group visible to every role.
pub const GENERAL_GROUP: &str = "general";

/// Visibility predicate for a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleScope {
    role: String,
}

impl RoleScope {
    /// Scope for a request authenticated with the given role.
    pub fn for_role(role: &str) -> Self {
        Self {
            role: role.to_string(),
        }
    }

    /// The requesting role's name.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns true when a record tagged `access_group` may be read
    /// under this scope.
    pub fn permits(&self, access_group: &str) -> bool {
        access_group == self.role || access_group == GENERAL_GROUP
    }

    /// The exact set of group tags this scope can see. Useful for
    /// backends that filter with an `IN (...)` clause instead of
    /// calling [`permits`](Self::permits) per record.
    pub fn allowed_groups(&self) -> [&str; 2] {
        [self.role.as_str(), GENERAL_GROUP]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_own_role() {
        let scope = RoleScope::for_role("hr");
        assert!(scope.permits("hr"));
    }

    #[test]
    fn test_permits_general() {
        let scope = RoleScope::for_role("engineering");
        assert!(scope.permits("general"));
    }

    #[test]
    fn test_denies_other_role() {
        let scope = RoleScope::for_role("engineering");
        assert!(!scope.permits("hr"));
        assert!(!scope.permits("finance"));
    }

    #[test]
    fn test_general_role_sees_only_general() {
        let scope = RoleScope::for_role("general");
        assert!(scope.permits("general"));
        assert!(!scope.permits("hr"));
    }

    #[test]
    fn test_allowed_groups() {
        let scope = RoleScope::for_role("finance");
        assert_eq!(scope.allowed_groups(), ["finance", "general"]);
    }
}
