//! API-side authorization guard.
//!
//! Enforced at the handler boundary (before dispatch), keeping domain
//! aggregates and infra auth-agnostic.

use trattoria_auth::{Permission, authorize};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Check one permission for the current request.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), ApiError> {
    authorize(principal.principal(), &Permission::new(permission))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use trattoria_auth::permissions as perm;
    use trattoria_auth::{Role, UserId};

    use super::*;

    #[test]
    fn customers_cannot_reach_admin_permissions() {
        let customer = PrincipalContext::new(UserId::generate(), "c@example.com", Role::CUSTOMER);
        let err = require(&customer, perm::DASHBOARD_VIEW).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(require(&customer, perm::ORDERS_OWN).is_ok());

        let admin = PrincipalContext::new(UserId::generate(), "a@example.com", Role::ADMIN);
        assert!(require(&admin, perm::DASHBOARD_VIEW).is_ok());
    }
}
