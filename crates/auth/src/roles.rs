use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use trattoria_core::DomainError;

use crate::Permission;
use crate::permissions as perm;

/// Role identifier used for RBAC.
///
/// The restaurant knows two roles: `admin` (staff) and `customer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const CUSTOMER: Role = Role(Cow::Borrowed("customer"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Accept only the known roles (case-insensitive).
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::ADMIN),
            "customer" => Ok(Role::CUSTOMER),
            other => Err(DomainError::validation(format!(
                "unknown role '{other}' (expected admin or customer)"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == "admin"
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role -> permission policy.
pub fn permissions_for_role(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "admin" => vec![Permission::new(perm::ALL)],
        "customer" => vec![
            Permission::new(perm::PROFILE_MANAGE),
            Permission::new(perm::ORDERS_OWN),
            Permission::new(perm::RESERVATIONS_OWN),
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_roles_only() {
        assert_eq!(Role::parse(" Admin ").unwrap(), Role::ADMIN);
        assert_eq!(Role::parse("customer").unwrap(), Role::CUSTOMER);
        assert!(matches!(Role::parse("chef"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn admin_gets_wildcard() {
        let perms = permissions_for_role(&Role::ADMIN);
        assert!(perms.iter().any(Permission::is_wildcard));
    }

    #[test]
    fn customer_cannot_manage_catalog() {
        let perms = permissions_for_role(&Role::CUSTOMER);
        assert!(perms.iter().all(|p| p.as_str() != perm::CATALOG_MANAGE));
        assert!(perms.iter().any(|p| p.as_str() == perm::ORDERS_OWN));
    }
}
