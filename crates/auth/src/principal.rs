use crate::{Permission, Role, UserId, permissions_for_role};

/// A resolved identity for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Expand roles into permissions using the static policy.
    pub fn from_roles(user_id: UserId, email: impl Into<String>, roles: Vec<Role>) -> Self {
        let mut permissions: Vec<Permission> = roles.iter().flat_map(permissions_for_role).collect();
        permissions.dedup();
        Self {
            user_id,
            email: email.into(),
            roles,
            permissions,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }
}
